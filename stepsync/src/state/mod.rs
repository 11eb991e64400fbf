pub mod page_state;
pub mod store;

pub use page_state::*;
pub use store::*;
