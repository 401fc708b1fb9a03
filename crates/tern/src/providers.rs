pub mod anthropic;
pub mod base;
pub mod configs;
pub mod databricks;
pub mod factory;
pub mod google;
pub mod openai;
pub mod responses;
pub mod retry;
pub mod utils;

#[cfg(test)]
pub mod mock;
