pub mod config;
pub mod keeper;
pub mod openai;
