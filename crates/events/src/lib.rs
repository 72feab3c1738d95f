//! `netops-events` — queue lifecycle event fan-out.
//!
//! The queue service publishes one [`QueueEvent`] per lifecycle transition;
//! WebSocket handlers subscribe with a [`SubscriptionFilter`]. No business
//! logic lives here.

pub mod bridge;
pub mod event;

pub use bridge::{QueueEventBridge, SubscriptionFilter};
pub use event::{QueueEvent, QueueEventKind};
