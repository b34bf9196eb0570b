pub mod segment;
pub mod timeline;
pub mod turn;

pub use segment::*;
pub use timeline::*;
pub use turn::*;
