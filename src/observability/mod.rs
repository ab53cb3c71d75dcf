//! Observability
//!
//! Structured logging helpers: subscriber installation and masking of
//! credentials before headers reach a log record.

pub mod tracing;

pub use self::tracing::{
    OutputFormat, TracingConfig, format_headers_for_logging, init_tracing, mask_sensitive_value,
};
