#![forbid(unsafe_code)]

//! Async shell around `drift-core`: refresh scheduling, the simulated
//! connection, and the store that publishes snapshots to subscribers.

pub mod adapter;
pub mod connection;
pub mod error;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod subscribers;

mod sync;

pub use adapter::*;
pub use connection::*;
pub use error::*;
pub use scheduler::*;
pub use source::*;
pub use store::*;
pub use subscribers::Subscription;
pub use sync::{shared_random, SharedRandom};
