//! Shared plumbing for the datasource refresh binaries.
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Right now this is the logging bootstrap: every binary in the workspace
//! builds a [`logging::LogConfig`], lets the environment override it, and
//! installs the global subscriber once at startup.
//!
//! ```no_run
//! use dsr_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel, LogOutput, LoggingGuard};
