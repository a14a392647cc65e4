//! `StringStore` adapters.

mod dto;
mod http_store;
mod memory_store;

pub use http_store::HttpStringStore;
pub use memory_store::InMemoryStringStore;
