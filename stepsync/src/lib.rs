pub mod channel;
pub mod config;
pub mod core;
pub mod hub;
pub mod page;
pub mod prelude;
pub mod protocol;
pub mod sequence;
pub mod state;
pub mod time;
pub mod transport;

pub use page::{Page, PageCommand, PageEvent};
