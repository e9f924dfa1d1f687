//! Core runtime pieces shared by every widget: event bus, frame clock,
//! debouncing and the background worker pool.

pub mod debounce;
pub mod event_bus;
pub mod frame_clock;
pub mod workers;

pub use debounce::Debouncer;
pub use event_bus::{EventBus, Subscription, downcast_event};
pub use frame_clock::{FrameClock, FrameTick};
pub use workers::Workers;
