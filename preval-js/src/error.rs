use crate::host::FileId;
use std::fmt;
use syntax_js::error::SyntaxError;

/// Failure while executing prepared code. `chain` lists the importing files from the root down to
/// the file that failed.
#[derive(Clone, PartialEq, Debug)]
pub struct EvalError {
  pub message: String,
  pub chain: Vec<FileId>,
}

impl EvalError {
  pub fn new(message: impl Into<String>) -> EvalError {
    EvalError {
      message: message.into(),
      chain: Vec::new(),
    }
  }

  /// Records that the failure surfaced while evaluating `file`.
  pub fn within(mut self, file: &FileId) -> EvalError {
    if self.chain.first() != Some(file) {
      self.chain.insert(0, file.clone());
    }
    self
  }
}

impl fmt::Display for EvalError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.message)?;
    if !self.chain.is_empty() {
      let chain: Vec<&str> = self.chain.iter().map(|f| f.as_str()).collect();
      write!(f, " (in {})", chain.join(" -> "))?;
    }
    Ok(())
  }
}

impl std::error::Error for EvalError {}

/// Errors that end the processing of a root file. All variants are cheap to clone so that a failed
/// action can be replayed to every later requester.
#[derive(Clone, Debug, thiserror::Error)]
pub enum PipelineError {
  #[error("{file}: {error}")]
  Parse { file: FileId, error: SyntaxError },

  #[error("cannot resolve {specifier:?} from {importer}: {message}")]
  Resolve {
    specifier: String,
    importer: FileId,
    message: String,
  },

  #[error("cannot load {file}: {message}")]
  Load { file: FileId, message: String },

  #[error(transparent)]
  Eval(#[from] EvalError),

  #[error("{file}: {message}")]
  Tag { file: FileId, message: String },

  #[error("invalid options: {0}")]
  Options(String),

  /// The scheduler ran out of work before the root action finished.
  #[error("processing of {0} stalled")]
  Stalled(FileId),

  /// An action produced an output of the wrong shape.
  #[error("internal error: {0}")]
  Internal(String),
}
