pub mod config;
pub mod embedding;
pub mod generation;
pub mod text;
