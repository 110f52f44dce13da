//! Error types for artifact encoding.

/// Errors raised while converting artifacts to and from cache bytes.
///
/// Protocol operations never return these to the pipeline: a failed encode
/// drops that artifact from the population pass, and a failed decode is a
/// cache miss.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An artifact could not be serialized.
    #[error("failed to encode artifact {key}: {reason}")]
    Encode {
        /// Cache key of the artifact.
        key: String,
        /// Description of the failure.
        reason: String,
    },

    /// Cached bytes could not be deserialized.
    #[error("failed to decode artifact: {reason}")]
    Decode {
        /// Description of the failure.
        reason: String,
    },
}
