//! Service layer for jobscout business logic.
//!
//! Domain logic separated from UI concerns; the CLI drives these and
//! renders their events.

pub mod qualify;

pub use qualify::{
    BatchEvent, BatchReport, JsonLinesSink, ListingSink, QualificationBatch, ScoredListing,
};
