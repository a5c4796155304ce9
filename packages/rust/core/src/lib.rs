//! Ledger annotation pipeline for robotscheck.
//!
//! This crate ties the success ledger, the robots.txt artifact store, and the
//! policy matcher together into a single run (`annotate`).

pub mod annotator;
pub mod ledger;

pub use annotator::{
    AnnotateSummary, DecodeFailure, ProgressReporter, RowOutcome, SilentProgress, annotate, decide,
};
pub use ledger::{LedgerReader, LedgerRow, LedgerWriter};
