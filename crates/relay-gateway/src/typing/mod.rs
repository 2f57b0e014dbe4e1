//! Typing indicator timers

mod debouncer;

pub use debouncer::{TypingDebouncer, TypingKey};
