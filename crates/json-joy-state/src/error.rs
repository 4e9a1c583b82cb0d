use thiserror::Error;

/// Error returned by an observer callback.
///
/// Observers are plain closures; anything convertible into a boxed error
/// (including `&str` and `String`) can be returned from them.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by observer callbacks.
pub type ObserverResult = Result<(), ObserverError>;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors raised by the state store and its value model.
#[derive(Debug, Error)]
pub enum StateError {
    /// An argument was rejected, e.g. an observer handle issued by a
    /// different registry.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Serialized input could not be accepted.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The live value refers back to one of its own ancestors while being
    /// diffed against the snapshot.
    #[error("cyclic object reference")]
    CyclicReference,

    /// A cycle was found while converting a value to JSON.
    #[error("cyclic object value cannot be converted to JSON")]
    CyclicValue,

    /// Attempt to mutate a frozen container.
    #[error("cannot mutate a frozen value")]
    Frozen,

    /// An observer failed; the notification pass was aborted.
    #[error("observer failed: {0}")]
    Observer(#[source] ObserverError),
}

/// Errors raised by storage backends.
///
/// These never escape a persistent store: they are logged and dropped at
/// the adapter boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
