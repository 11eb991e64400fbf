pub mod clock;
pub mod ticker;

pub use clock::*;
pub use ticker::*;
