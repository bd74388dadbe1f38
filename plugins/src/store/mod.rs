//! In-memory method, objective and execution audit storage

mod catalog;
mod memory;

pub use catalog::Catalog;
pub use memory::InMemoryStore;
