pub mod extractor;
pub mod login;
pub mod models;
pub mod security;
