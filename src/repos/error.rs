use thiserror::Error;

/// Store-level failures.
///
/// The in-memory stores only fail when a lock was poisoned by a panicking
/// writer, or when an insert collides with an existing key. Callers map
/// both into an explicit rejection, never into a default outcome.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("store lock poisoned")]
    Poisoned,

    #[error("duplicate key: {0}")]
    Duplicate(&'static str),
}
