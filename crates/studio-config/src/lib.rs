//! Configuration and shared utilities for the Figura Studio client core.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, DEFAULT_API_URL, DEFAULT_PUBLISHABLE_KEY, DEFAULT_WEB_APP_URL};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
