pub mod accounting;
pub mod client;
pub mod errors;
pub mod models;
pub mod providers;
pub mod unescape;
pub mod validation;
