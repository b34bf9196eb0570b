pub mod consolidate;
pub mod group;
pub mod segment;
pub mod speakers;

pub use consolidate::*;
pub use group::*;
pub use segment::*;
pub use speakers::*;
