use lazybox_backend::BackendError;
use lazybox_core::BuildError;
use thiserror::Error;

use crate::masquerade::MasqueradeError;

/// Error returned by a coordinator call or a deferred rebuild.
///
/// Contention is never an error: a call that runs out of passes returns
/// [`Outcome::Exhausted`](crate::Outcome::Exhausted) instead.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The cache store, lock service or queue failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// The builder failed, timed out or is unknown.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// A deferred rebuild could not switch identity.
    #[error(transparent)]
    Masquerade(#[from] MasqueradeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn describe(error: CoordinatorError) -> &'static str {
        match error {
            CoordinatorError::Backend(_) => "backend",
            CoordinatorError::Build(_) => "build",
            CoordinatorError::Masquerade(_) => "masquerade",
        }
    }

    #[test]
    fn lower_layers_convert() {
        let backend: CoordinatorError = BackendError::internal("gone").into();
        let build: CoordinatorError = BuildError::failed("boom").into();
        let nested: CoordinatorError = MasqueradeError::Nested.into();

        assert_eq!(describe(backend), "backend");
        assert_eq!(describe(build), "build");
        assert_eq!(describe(nested), "masquerade");
    }
}
