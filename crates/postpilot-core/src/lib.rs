//! `postpilot-core`: configuration, errors, and wire types shared by every
//! postpilot crate.

pub mod config;
pub mod error;
pub mod push;
pub mod types;

pub use error::{PostpilotError, Result};
pub use types::{Platform, PostKind, UserId};
