//! Online presence

mod tracker;

pub use tracker::PresenceTracker;
