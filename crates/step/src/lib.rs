//! Row-driven transfer step.
//!
//! Each input row names an access token, a source and a target. The step
//! resolves those fields, moves the file through a backend built for the
//! row's token, and routes the row to the success or failure output.
//!
//! # Stop rules
//!
//! - **Row failures**: empty field values and transfer errors fail the row;
//!   later rows still run.
//! - **Step failures**: a mapped field missing from the first row, an upload
//!   source that is missing or not a file, and cancellation stop the step.

pub mod config;
pub mod error;
pub mod fields;
pub mod runner;
pub mod types;

// Re-export primary types for convenience.
pub use config::{StepConfig, TransferSettings};
pub use error::StepError;
pub use fields::{FieldMap, RowFields};
pub use runner::StepRunner;
pub use types::{Direction, Route, Row, RowOutcome, StepEvent, StepReport};
