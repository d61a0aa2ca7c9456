//! Long-running pipeline workers
//!
//! Each worker is a loop that wakes on an interval, does one bounded unit of
//! work against the store, and checks its cancellation token between
//! iterations. All coordination happens through the store; workers share no
//! in-memory state.

pub mod drive_watcher;
pub mod encode_queue;
pub mod file_mover;
pub mod identifier;
pub mod oversight;
pub mod rip_queue;
