//! Room membership cache and joins

mod index;

pub use index::{RoomIndex, RoomIndexError, RoomJoin};
