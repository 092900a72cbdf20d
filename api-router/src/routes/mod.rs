pub mod chat;
pub mod courses;
pub mod files;
pub mod health;
pub mod search;
pub mod upload;
