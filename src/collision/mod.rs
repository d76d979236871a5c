pub mod sat;

// Re-export commonly used items
pub use sat::{intersect, tile_obb, OrientedRect, SatResult};
