//! fm-core: stable foundation for the flight-model graph.
//!
//! Contains:
//! - ids (typed compact IDs for signals, blocks, breakpoint sets, tables)
//! - epoch (the evaluation-cycle freshness token)
//! - numeric (Real + float helpers)
//! - error (shared error types)

pub mod epoch;
pub mod error;
pub mod ids;
pub mod numeric;

pub use epoch::Epoch;
pub use error::{FmError, FmResult};
pub use ids::*;
pub use numeric::*;
