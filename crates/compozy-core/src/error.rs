//! Shared error scaffolding for `compozy-core` itself.
//!
//! Domain crates (`compozy-storage`, `compozy-cache`, `compozy-api`) define their own
//! `thiserror` enums with sentinel constructors (`TaskStateError::not_found(id)` and
//! friends) rather than reusing this one — this enum only covers failures that
//! originate inside `compozy-core`'s own primitives.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error(transparent)]
    Jsonb(#[from] crate::jsonb::JsonbError),
}

pub type Result<T> = std::result::Result<T, Error>;
