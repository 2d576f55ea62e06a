use crate::foundation::core::StreamKind;

/// Convenience result type used across ffrecipe.
pub type RecipeResult<T> = Result<T, RecipeError>;

/// Top-level error taxonomy used by recipe, compiler and command APIs.
///
/// Every variant is terminal for the current build: nothing is retried and no partial command
/// is assembled once one of these surfaces.
#[derive(thiserror::Error, Debug)]
pub enum RecipeError {
    /// The probe collaborator could not read or interpret a media file.
    #[error("probe failed for '{path}': {reason}")]
    ProbeFailure {
        /// File path as written in the recipe.
        path: String,
        /// Human-readable cause.
        reason: String,
    },

    /// A shared sub-tree (or target) name is used but never defined.
    #[error("unresolved reference '{0}'")]
    UnresolvedReference(String),

    /// A named reference transitively refers back to itself.
    #[error("cyclic reference through '{0}'")]
    CyclicReference(String),

    /// A node asked for a stream beyond what one of its inputs resolved to.
    #[error("node '{node}' requests {kind} stream {index} (zero-based), but only {available} available")]
    StreamIndexOutOfRange {
        /// Recipe key path of the offending node.
        node: String,
        /// Stream domain of the request.
        kind: StreamKind,
        /// Requested zero-based stream index.
        index: usize,
        /// Number of streams actually available.
        available: usize,
    },

    /// A recipe fragment does not match any known node shape.
    #[error("malformed node at '{path}': {reason}")]
    MalformedNode {
        /// Recipe key path of the offending fragment.
        path: String,
        /// Human-readable cause.
        reason: String,
    },

    /// The external processing tool failed to start or exited unsuccessfully.
    #[error("process error: {0}")]
    Process(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RecipeError {
    /// Build a [`RecipeError::ProbeFailure`] value.
    pub fn probe(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProbeFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`RecipeError::MalformedNode`] value.
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedNode {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`RecipeError::UnresolvedReference`] value.
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self::UnresolvedReference(name.into())
    }

    /// Build a [`RecipeError::StreamIndexOutOfRange`] value.
    pub fn out_of_range(
        node: impl Into<String>,
        kind: StreamKind,
        index: usize,
        available: usize,
    ) -> Self {
        Self::StreamIndexOutOfRange {
            node: node.into(),
            kind,
            index,
            available,
        }
    }

    /// Build a [`RecipeError::Process`] value.
    pub fn process(msg: impl Into<String>) -> Self {
        Self::Process(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
