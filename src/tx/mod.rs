//! Transaction building, signing glue, and the submission pipeline
//!
//! - **scval**: contract argument construction and return-value decoding
//! - **builder**: unsigned envelope construction and simulation grafting
//! - **pipeline**: the submit/confirm protocol every operation goes through

pub mod builder;
pub mod pipeline;
pub mod scval;

pub use builder::{apply_simulation, envelope_to_base64, EnvelopeBuilder, OperationSpec};
pub use pipeline::{confirm, simulate_call, submit_and_confirm, SubmissionConfig};
