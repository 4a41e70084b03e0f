pub mod bucket;
pub mod gateway;
pub mod warehouse;

pub use bucket::*;
pub use gateway::*;
pub use warehouse::*;
