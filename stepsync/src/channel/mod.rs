pub mod adapter;
pub mod queue;

pub use adapter::*;
pub use queue::*;
