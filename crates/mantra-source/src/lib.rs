//! External exercise data sources.
//!
//! Both sources implement [`mantra_core::ExternalSource`] and share the same
//! session mapping:
//! - [`HttpSource`] reads a fitness platform's HTTP API
//! - [`FileSource`] reads a JSON lines export from disk

mod file;
mod http;
mod session;

pub use file::FileSource;
pub use http::{ClientError, HttpSource};
pub use session::{
    CALORIES_PER_MINUTE, DEFAULT_LOOKBACK_HOURS, DEFAULT_NAME, Session, SessionMapping,
};
