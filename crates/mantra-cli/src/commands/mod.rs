//! CLI subcommand implementations.
//!
//! Each command writes its output to a caller-supplied writer so it can be
//! snapshot-tested against an in-memory engine.

pub mod add;
pub mod conflicts;
pub mod list;
pub mod maintenance;
pub mod resolve;
pub mod status;
pub mod sync;
pub mod util;
