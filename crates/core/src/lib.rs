#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Pure building blocks of the drift engine: bounded perturbation,
//! ordered status classification, timing windows and snapshots.
//!
//! Nothing in this crate schedules or blocks; the async shell lives in
//! `drift-engine`.

pub mod classify;
pub mod config;
pub mod error;
pub mod perturb;
pub mod random;
pub mod snapshot;
pub mod time;

pub use classify::*;
pub use config::*;
pub use error::*;
pub use perturb::*;
pub use random::*;
pub use snapshot::*;
pub use time::*;
