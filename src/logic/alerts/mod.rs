//! Alerts Module
//!
//! - `dedup` - watermark filter, at most one new alert per batch
//! - `notify` - notices, sinks and the single-notice toast slot

pub mod dedup;
pub mod notify;

pub use dedup::AlertDeduplicator;
pub use notify::{AlertNotice, AlertSink, ChannelSink, NullSink, ToastSlot};
