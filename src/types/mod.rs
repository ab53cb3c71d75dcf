//! Configuration types.

pub mod config;
pub mod parsing;

pub use config::{ClientConfig, ClientConfigBuilder};
pub use parsing::ParsingOptions;
