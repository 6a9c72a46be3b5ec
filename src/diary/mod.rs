pub mod attachments;
pub mod handlers;
pub mod models;
pub mod multipart;
pub mod store;
pub mod text;
