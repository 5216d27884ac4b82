pub mod item;

pub use item::{CatalogRepository, InventoryItem};
