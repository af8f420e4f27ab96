//! Utility Module
//!
//! - [`FrameClock`]: source of the frame index used for eviction
//! - [`Event`] / [`Subscription`]: single-threaded observer registry with
//!   RAII unsubscription, used for texture resize notification

pub mod event;
pub mod time;

pub use event::{Event, SubscriberId, Subscription};
pub use time::FrameClock;
