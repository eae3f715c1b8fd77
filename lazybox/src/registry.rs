//! Late binding of builder references.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use lazybox_core::{BuildError, Builder, BuilderKind, BuilderRef, Raw};
use smol_str::SmolStr;
use tracing::trace;

/// Maps builder references to live builders.
///
/// A [`BuilderRef`] is plain data that survives a queue. The registry turns
/// it back into something callable at execution time, on the request path
/// and on the worker path alike, so both must register the same builders.
///
/// ```
/// use lazybox::BuilderRegistry;
/// use lazybox_core::{BuilderRef, Raw, builder_fn};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = BuilderRegistry::new();
/// registry.register_function("hello", builder_fn(|_| async { Ok(Raw::from("hi")) }));
///
/// let reference = BuilderRef::function("hello", ()).unwrap();
/// let out = registry.execute(&reference, None).await.unwrap();
/// assert_eq!(out, Raw::from("hi"));
/// # }
/// ```
#[derive(Default)]
pub struct BuilderRegistry {
    builders: DashMap<(BuilderKind, SmolStr), Arc<dyn Builder>>,
}

impl std::fmt::Debug for BuilderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuilderRegistry")
            .field("builders", &self.builders.len())
            .finish()
    }
}

impl BuilderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `builder` under `kind` and `identifier`, replacing any previous one.
    pub fn register<B>(&self, kind: BuilderKind, identifier: impl Into<SmolStr>, builder: B)
    where
        B: Builder + 'static,
    {
        self.builders
            .insert((kind, identifier.into()), Arc::new(builder));
    }

    /// Registers a free function builder.
    pub fn register_function<B>(&self, name: impl Into<SmolStr>, builder: B)
    where
        B: Builder + 'static,
    {
        self.register(BuilderKind::Function, name, builder);
    }

    /// Registers a method builder as `Owner::method`.
    pub fn register_method<B>(&self, owner: &str, method: &str, builder: B)
    where
        B: Builder + 'static,
    {
        self.register(BuilderKind::Method, format!("{owner}::{method}"), builder);
    }

    /// Looks up the builder a reference names.
    pub fn resolve(&self, reference: &BuilderRef) -> Option<Arc<dyn Builder>> {
        let key = (reference.kind(), SmolStr::new(reference.identifier()));
        self.builders.get(&key).map(|builder| builder.clone())
    }

    /// Returns `true` if a builder is registered for `reference`.
    pub fn contains(&self, reference: &BuilderRef) -> bool {
        self.resolve(reference).is_some()
    }

    /// Resolves `reference` and runs it with its bound arguments.
    ///
    /// With a `timeout`, a builder still running when it elapses is dropped
    /// and the call fails with [`BuildError::Timeout`].
    pub async fn execute(
        &self,
        reference: &BuilderRef,
        timeout: Option<Duration>,
    ) -> Result<Raw, BuildError> {
        let builder = self
            .resolve(reference)
            .ok_or_else(|| BuildError::UnknownBuilder(reference.to_string()))?;
        trace!(builder = %reference, "running builder");

        let build = builder.build(reference.args());
        match timeout {
            Some(limit) => tokio::time::timeout(limit, build)
                .await
                .map_err(|_| BuildError::Timeout(limit))?,
            None => build.await,
        }
    }
}
