use gazette_core::StoreError;

/// Errors surfaced at the service boundary, each mapping to a response
/// status. Stats *reads* never produce these (they degrade to zeros), but
/// counter *writes* do, because silent counter drift is a correctness
/// problem.
#[derive(Debug, thiserror::Error)]
pub enum BookmarksError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    /// A downstream store call failed; the underlying cause is attached for
    /// diagnostics.
    #[error("{context}: {source}")]
    Dependency {
        context: String,
        #[source]
        source: StoreError,
    },

    /// The row mutation committed but the counter merge failed. The row
    /// change stands; the counters are now behind until a recompute repairs
    /// them.
    #[error("bookmark change saved but counters were not updated: {source}")]
    CounterDrift {
        #[source]
        source: StoreError,
    },
}

impl BookmarksError {
    pub fn status_code(&self) -> u16 {
        match self {
            BookmarksError::Validation(_) => 400,
            BookmarksError::Conflict(_) => 409,
            BookmarksError::NotFound(_) => 404,
            BookmarksError::Dependency { .. } => 502,
            BookmarksError::CounterDrift { .. } => 500,
        }
    }

    pub(crate) fn dependency(context: &str, source: StoreError) -> BookmarksError {
        BookmarksError::Dependency {
            context: context.to_string(),
            source,
        }
    }
}

impl From<StoreError> for BookmarksError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => BookmarksError::NotFound(format!("{what} is not saved")),
            StoreError::AlreadyExists(what) => {
                BookmarksError::Conflict(format!("{what} is already saved"))
            }
            StoreError::Validation(msg) => BookmarksError::Validation(msg),
            storage @ StoreError::Storage(_) => {
                BookmarksError::dependency("bookmark store", storage)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(
            BookmarksError::Validation("postId is required".into()).status_code(),
            400
        );
        assert_eq!(
            BookmarksError::Conflict("p1 is already saved".into()).status_code(),
            409
        );
        assert_eq!(
            BookmarksError::NotFound("p1 is not saved".into()).status_code(),
            404
        );
        assert_eq!(
            BookmarksError::dependency("listing", StoreError::Storage("io".into())).status_code(),
            502
        );
        assert_eq!(
            BookmarksError::CounterDrift {
                source: StoreError::Storage("io".into()),
            }
            .status_code(),
            500
        );
    }

    #[test]
    fn store_errors_map_to_client_facing_variants() {
        let err: BookmarksError = StoreError::AlreadyExists("p1".into()).into();
        assert!(matches!(err, BookmarksError::Conflict(_)));

        let err: BookmarksError = StoreError::NotFound("p1".into()).into();
        assert!(matches!(err, BookmarksError::NotFound(_)));

        let err: BookmarksError = StoreError::Storage("disk".into()).into();
        assert_eq!(err.status_code(), 502);
    }

    #[test]
    fn counter_drift_keeps_the_cause() {
        let err = BookmarksError::CounterDrift {
            source: StoreError::Storage("locked".into()),
        };
        assert!(err.to_string().contains("counters were not updated"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
