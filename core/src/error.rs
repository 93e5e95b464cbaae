//! Non-fatal error taxonomy for the key handler (C6).
//!
//! `handle()` never returns these as a `Result`: per the state-machine design, every
//! error is signaled through `error_callback` and accompanied by a re-emitted state that
//! preserves whatever the user had composed. `EngineError` exists so that signal has a
//! concrete, matchable shape instead of an opaque string.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("key is not valid for the current state")]
    InvalidKeyForState,
    #[error("no unigrams exist for the attempted reading")]
    NoUnigramsForReading,
    #[error("cursor move blocked at grid boundary")]
    CursorAtBoundary,
    #[error("delete blocked at grid boundary")]
    DeleteAtBoundary,
    #[error("delete pressed while a reading is still active")]
    DeleteWhileReadingActive,
    #[error("marked range is not acceptable as a new phrase")]
    MarkingNotAcceptable,
}

/// Structural failures that are not part of the closed state-machine taxonomy above:
/// out-of-range configuration, in the one place `Config` rejects a value outright
/// instead of clamping it.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("candidate_keys must contain between 4 and 15 unique lowercase characters")]
    InvalidCandidateKeys,
    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}
