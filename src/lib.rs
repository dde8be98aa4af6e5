//! artsweep - delete aged artifacts from an Artifactory instance
//!
//! A run parses an age expression into a cutoff, loads exclusion patterns,
//! pages through an externally supplied AQL query, keeps candidates that are
//! old enough and not excluded, and deletes them with a bounded worker pool.
//! Dry runs go through the same pipeline without issuing deletes.

pub mod age;
pub mod artifact;
pub mod dispatch;
pub mod error;
pub mod exclusion;
pub mod query;
pub mod report;
pub mod repository;
pub mod select;
pub mod sweep;

pub use error::{Result, SweepError};
pub use sweep::{SweepReport, SweepRequest, Sweeper};
