pub mod durability;
pub mod storage;

pub use durability::*;
pub use storage::*;
