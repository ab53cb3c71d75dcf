//! Error Handling Module
//!
//! Every call path ends in exactly one of: a success value, one `ClientError`,
//! or silent cancellation. This module holds the error type, its categories
//! and conversions from the crates the core builds on.
//!
//! # Example
//!
//! ```rust,ignore
//! use siumai_exec::error::{ClientError, ErrorCategory};
//!
//! let error = ClientError::api_error(404, "not_found");
//! assert_eq!(error.category(), ErrorCategory::Api);
//! assert_eq!(error.status_code(), Some(404));
//! ```

mod conversions;
pub mod types;

pub use types::*;
