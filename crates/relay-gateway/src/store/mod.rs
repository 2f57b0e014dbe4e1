//! Store backends hosted by the gateway

mod memory;

pub use memory::InMemoryStore;
