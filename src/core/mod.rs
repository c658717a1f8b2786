//! Shared infrastructure: console output, progress bars, the destination lock
//! and cooperative cancellation.

pub mod cancel;
pub mod lock;
pub mod output;
pub mod progress;

pub use cancel::CancelToken;
pub use lock::{DestinationLock, LockError, acquire_destination_lock};
