pub mod classify;
pub mod event;
pub mod feed;
pub mod handler;
pub mod merge;

pub use event::{ChangeBatch, ChangeEvent, EventName};
pub use feed::{run_consumer, ChangeFeed};
pub use handler::{BatchReport, StreamHandler};
