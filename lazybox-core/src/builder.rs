//! Builder references and the builder trait.
//!
//! A builder is the expensive function that produces page or block content.
//! Deferred rebuilds run long after the request that triggered them, on a
//! worker that only sees a serialized [`RebuildJob`](crate::RebuildJob), so a
//! builder is never referenced by closure. Instead a [`BuilderRef`] names it
//! (`kind` + `identifier`) and carries its bound arguments as JSON values. The
//! name is resolved to a live [`Builder`] at execution time through a
//! registry.
//!
//! ```
//! use lazybox_core::{BuilderKind, BuilderRef};
//!
//! let builder = BuilderRef::function("front_page", ("news", 10)).unwrap();
//! assert_eq!(builder.kind(), BuilderKind::Function);
//! assert_eq!(builder.identifier(), "front_page");
//! assert_eq!(builder.args().len(), 2);
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;
use thiserror::Error;

use crate::job::JobError;
use crate::{Raw, SEPARATOR};

/// How a builder identifier is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuilderKind {
    /// A free function, identified by its name.
    Function,
    /// A method, identified as `Owner::method`.
    Method,
}

impl BuilderKind {
    /// Returns the kind as a string slice.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            BuilderKind::Function => "function",
            BuilderKind::Method => "method",
        }
    }
}

/// A serializable reference to a builder plus its fixed arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderRef {
    kind: BuilderKind,
    identifier: SmolStr,
    args: Vec<Value>,
}

impl BuilderRef {
    /// References a free function.
    ///
    /// `args` is serialized right away: a value that cannot become JSON is
    /// rejected here rather than when the job reaches the queue.
    pub fn function(name: impl AsRef<str>, args: impl Serialize) -> Result<Self, JobError> {
        Self::new(BuilderKind::Function, name.as_ref(), args)
    }

    /// References a method on `owner`.
    pub fn method(
        owner: impl AsRef<str>,
        method: impl AsRef<str>,
        args: impl Serialize,
    ) -> Result<Self, JobError> {
        let owner = owner.as_ref();
        let method = method.as_ref();
        if owner.is_empty() || method.is_empty() {
            return Err(JobError::InvalidIdentifier(format!("{owner}::{method}")));
        }
        Self::new(BuilderKind::Method, &format!("{owner}::{method}"), args)
    }

    fn new(kind: BuilderKind, identifier: &str, args: impl Serialize) -> Result<Self, JobError> {
        if identifier.is_empty() || identifier.contains(SEPARATOR) {
            return Err(JobError::InvalidIdentifier(identifier.to_owned()));
        }
        let args = match serde_json::to_value(args).map_err(JobError::Serialization)? {
            Value::Array(values) => values,
            Value::Null => Vec::new(),
            single => vec![single],
        };
        Ok(BuilderRef {
            kind,
            identifier: SmolStr::new(identifier),
            args,
        })
    }

    /// Returns how the identifier is bound.
    #[inline]
    pub fn kind(&self) -> BuilderKind {
        self.kind
    }

    /// Returns the builder identifier.
    #[inline]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns the bound arguments.
    #[inline]
    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

impl fmt::Display for BuilderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.kind.as_str(), SEPARATOR, self.identifier)
    }
}

/// Error raised while running a builder.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The builder itself failed.
    #[error("builder failed: {0}")]
    Failed(Box<dyn std::error::Error + Send + Sync>),

    /// The builder did not finish within the configured build timeout.
    #[error("builder timed out after {0:?}")]
    Timeout(Duration),

    /// No builder is registered under the referenced identifier.
    #[error("no builder registered for {0}")]
    UnknownBuilder(String),
}

impl BuildError {
    /// Wraps any error (or message) as a builder failure.
    pub fn failed(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        BuildError::Failed(error.into())
    }
}

/// Produces content from a list of bound arguments.
///
/// Implementations that depend on the caller's identity read it from a
/// [`ContextProvider`](crate::ContextProvider): deferred builds run under a
/// masquerade of the requesting context.
#[async_trait]
pub trait Builder: Send + Sync {
    /// Builds the content.
    async fn build(&self, args: &[Value]) -> Result<Raw, BuildError>;
}

/// Adapter turning an async closure into a [`Builder`].
///
/// Created by [`builder_fn`].
#[derive(Clone)]
pub struct BuilderFn<F> {
    f: F,
}

impl<F> fmt::Debug for BuilderFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderFn")
            .field("f", &std::any::type_name::<F>())
            .finish()
    }
}

/// Wraps an async closure taking the bound arguments.
///
/// ```
/// use lazybox_core::{Builder, Raw, builder_fn};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let greet = builder_fn(|args| async move {
///     let name = args[0].as_str().unwrap_or("nobody").to_owned();
///     Ok(Raw::from(format!("hello {name}")))
/// });
/// let out = greet.build(&[serde_json::json!("ada")]).await.unwrap();
/// assert_eq!(out, Raw::from("hello ada"));
/// # }
/// ```
pub fn builder_fn<F, Fut>(f: F) -> BuilderFn<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Raw, BuildError>> + Send,
{
    BuilderFn { f }
}

#[async_trait]
impl<F, Fut> Builder for BuilderFn<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Raw, BuildError>> + Send,
{
    async fn build(&self, args: &[Value]) -> Result<Raw, BuildError> {
        (self.f)(args.to_vec()).await
    }
}
