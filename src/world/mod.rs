pub mod generator;
pub mod loader;
pub mod manager;
pub mod serialization;

// Re-export commonly used items
pub use generator::{demo_registry, generate_demo_map};
pub use manager::{LoadReport, TileMap, TileMapConfig};
pub use serialization::TileMapError;
