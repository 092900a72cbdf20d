pub mod chunk_store;
pub mod db;
pub mod indexes;
pub mod store;
pub mod types;
