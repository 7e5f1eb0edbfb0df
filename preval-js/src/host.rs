use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Identity of a source file, usually its absolute path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub Arc<str>);

impl FileId {
  pub fn new(name: impl Into<Arc<str>>) -> FileId {
    FileId(name.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// File name without directories or extension, e.g. `button` for `/src/button.js`.
  pub fn stem(&self) -> &str {
    Path::new(self.as_str())
      .file_stem()
      .and_then(|s| s.to_str())
      .unwrap_or(self.as_str())
  }
}

impl fmt::Debug for FileId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:?}", self.as_str())
  }
}

impl fmt::Display for FileId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl From<&str> for FileId {
  fn from(value: &str) -> Self {
    FileId::new(value)
  }
}

/// Failure reported by a host collaborator (loading or resolving a file).
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
#[error("{message}")]
pub struct HostError {
  message: String,
}

impl HostError {
  pub fn new(message: impl Into<String>) -> HostError {
    HostError {
      message: message.into(),
    }
  }

  pub fn message(&self) -> &str {
    &self.message
  }
}

/// Provides source text for files.
pub trait Loader {
  fn file_text(&self, file: &FileId) -> Result<Arc<str>, HostError>;
}

/// Maps an import specifier to a file. `stack` lists the importing files, innermost last.
pub trait Resolver {
  fn resolve(&self, specifier: &str, importer: &FileId, stack: &[FileId])
    -> Result<FileId, HostError>;
}

/// Non-blocking counterpart of [`Resolver`]. Every [`Resolver`] is also an `AsyncResolver` whose
/// futures are immediately ready.
pub trait AsyncResolver {
  fn resolve_async(
    &self,
    specifier: String,
    importer: FileId,
    stack: Vec<FileId>,
  ) -> LocalBoxFuture<'_, Result<FileId, HostError>>;
}

impl<R: Resolver + ?Sized> AsyncResolver for R {
  fn resolve_async(
    &self,
    specifier: String,
    importer: FileId,
    stack: Vec<FileId>,
  ) -> LocalBoxFuture<'_, Result<FileId, HostError>> {
    let result = self.resolve(&specifier, &importer, &stack);
    async move { result }.boxed_local()
  }
}
