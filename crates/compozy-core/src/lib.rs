//! Shared primitives used by every other `compozy-*` crate: the opaque `Id` and
//! free-form `Output` types, the JSONB codec, the placeholder builder, the scan
//! facade, error scaffolding, and configuration.

pub mod config;
pub mod error;
pub mod id;
pub mod jsonb;
pub mod output;
pub mod placeholder;
pub mod scan;

pub use error::{Error, Result};
pub use id::Id;
pub use output::Output;
