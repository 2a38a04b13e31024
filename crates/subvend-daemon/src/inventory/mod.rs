//! Token inventory: the JSON-backed bucket store and the allocator
//! policy layer over it.

mod allocator;
mod store;

pub use allocator::Allocator;
pub use store::{InventoryError, InventoryStore};
