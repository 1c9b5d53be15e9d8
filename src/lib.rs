//! An amortized O(1) priority queue based on:
//! Brown R, 1988. Calendar Queues: A Fast O(1) Priority Queue Implementation
//! for the Simulation Event Set Problem. Communications of the ACM 31(10),
//! 1220-1227.
//!
//! Insertion, maximum lookup and removal all run in amortized O(1) time with
//! a favorable constant compared to tree-based priority queues. Each item
//! carries a non-negative `f64` priority and an arbitrary caller-owned
//! entry; items are pooled and recycled rather than allocated individually.
//!
//! The structure is not internally synchronized; wrap it in external
//! synchronization if it must be shared.

mod pool;
mod queue;

pub use pool::ItemId;
pub use queue::CalendarQueue;

use std::collections::TryReserveError;
use std::fmt;

/// Error type for queue operations.
#[derive(Debug)]
pub enum Error {
    /// A priority was negative or NaN
    InvalidPriority(f64),
    /// The item pool or bucket array could not be grown
    Alloc(TryReserveError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidPriority(priority) => write!(f, "invalid priority: {}", priority),
            Error::Alloc(err) => write!(f, "allocation failed: {}", err),
        }
    }
}

impl From<TryReserveError> for Error {
    fn from(err: TryReserveError) -> Self {
        Error::Alloc(err)
    }
}
