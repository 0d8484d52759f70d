//! Per-workflow event fan-out.
//!
//! Provides an `EventBus` that distributes `Event` messages to the
//! subscribers of a single workflow id.

pub mod bus;

pub use bus::{EventBus, SubscriptionId};
