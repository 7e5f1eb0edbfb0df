//! Build-time evaluation of tagged templates.
//!
//! A root module is processed for its tagged templates: every module it depends on is shaken down
//! to the exports actually needed, the interpolations are evaluated, and the templates are replaced
//! by generated class names while their text is extracted as artifacts.
//!
//! Work is split into resumable [actions](action) run by a [scheduler](action::scheduler). The same
//! actions run under [`transform`] and [`transform_async`]; only the way import specifiers are
//! resolved differs. Results are kept in a [`Cache`](cache::Cache) that can be shared between runs
//! and is invalidated per file when a file's content changes.

use crate::action::scheduler::Scheduler;
use crate::action::ActionData;
use crate::action::ActionKind;
use crate::action::ActionRequest;
use crate::action::Outcome;
use crate::entrypoint::Entrypoint;
use crate::error::PipelineError;
use crate::eval::ModuleRunner;
use crate::host::AsyncResolver;
use crate::host::FileId;
use crate::host::Resolver;
use crate::services::Services;
use crate::tags::Artifact;
use crate::tags::PREVAL_EXPORT;
use serde::Serialize;
use shaker_js::WILDCARD;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;
use tracing::warn;

pub mod action;
pub mod cache;
pub mod entrypoint;
pub mod error;
pub mod eval;
pub mod exports;
pub mod host;
pub mod options;
pub mod services;
pub mod tags;
pub mod value;

/// Result of transforming a root module.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct TransformOutput {
  pub code: String,
  pub artifacts: Vec<Artifact>,
  /// Every file the output depends on; a change to any of them invalidates it.
  pub dependencies: Vec<FileId>,
}

fn workflow_request(
  services: &Services,
  file: &FileId,
  source: &str,
) -> Result<ActionRequest, PipelineError> {
  let only: BTreeSet<String> = [PREVAL_EXPORT.to_string()].into_iter().collect();
  let created = Entrypoint::create(services, None, file, &only, Some(Arc::from(source)))?;
  Ok(ActionRequest::new(
    ActionKind::Workflow,
    created.entrypoint(),
    ActionData::None,
  ))
}

fn finish(
  services: &Services,
  file: &FileId,
  source: &str,
  outcome: Outcome,
) -> Result<TransformOutput, PipelineError> {
  let result = outcome.and_then(|output| {
    output
      .into_output()
      .ok_or_else(|| PipelineError::Internal("workflow produced no output".to_string()))
  });
  match result {
    Ok(output) => Ok(Rc::unwrap_or_clone(output)),
    Err(err) if services.options.soft_errors => {
      warn!(file = %file, error = %err, "processing failed, passing the source through");
      Ok(TransformOutput {
        code: source.to_string(),
        artifacts: Vec::new(),
        dependencies: services
          .cache
          .transitive_dependencies(file)
          .into_iter()
          .collect(),
      })
    }
    Err(err) => Err(err),
  }
}

/// Transforms the root module `file` with content `source`, resolving specifiers synchronously.
pub fn transform(
  services: &Services,
  resolver: &dyn Resolver,
  file: &FileId,
  source: &str,
) -> Result<TransformOutput, PipelineError> {
  let outcome = workflow_request(services, file, source)
    .and_then(|request| Scheduler::new(services).run_blocking(request, resolver));
  finish(services, file, source, outcome)
}

/// Like [`transform`], but awaits the resolver, so other work can proceed while a resolution is
/// pending.
pub async fn transform_async(
  services: &Services<'_>,
  resolver: &dyn AsyncResolver,
  file: &FileId,
  source: &str,
) -> Result<TransformOutput, PipelineError> {
  let outcome = match workflow_request(services, file, source) {
    Ok(request) => Scheduler::new(services).run_async(request, resolver).await,
    Err(err) => Err(err),
  };
  finish(services, file, source, outcome)
}

/// Values of the requested exports of an evaluated module.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct EvaluationReport {
  /// Export name to its value as JSON, or the error reading it raised.
  pub values: BTreeMap<String, Result<serde_json::Value, String>>,
  pub dependencies: Vec<FileId>,
}

/// Prepares `file` for the exports in `only` (`*` for all of them) and evaluates it.
pub fn evaluate<S: Into<String>>(
  services: &Services,
  resolver: &dyn Resolver,
  file: &FileId,
  only: impl IntoIterator<Item = S>,
) -> Result<EvaluationReport, PipelineError> {
  let only: BTreeSet<String> = only.into_iter().map(Into::into).collect();
  let created = Entrypoint::create(services, None, file, &only, None)?;
  let request = ActionRequest::new(
    ActionKind::ProcessEntrypoint,
    created.entrypoint(),
    ActionData::None,
  );
  let module = Scheduler::new(services)
    .run_blocking(request, resolver)?
    .into_prepared()
    .ok_or_else(|| PipelineError::Internal("no prepared module".to_string()))?;
  // Processing may have superseded the entrypoint we started with.
  let entrypoint = services
    .cache
    .entrypoint(file)
    .unwrap_or_else(|| created.entrypoint().clone());
  let exports = ModuleRunner::new(services).run(&entrypoint, &module)?;
  debug!(file = %file, names = exports.len(), "evaluated");

  let names: Vec<String> = if only.contains(WILDCARD) {
    exports.names()
  } else {
    only.into_iter().collect()
  };
  let values = names
    .into_iter()
    .map(|name| {
      let value = exports
        .get(&name)
        .map(|v| v.to_json())
        .map_err(|e| e.to_string());
      (name, value)
    })
    .collect();
  Ok(EvaluationReport {
    values,
    dependencies: services
      .cache
      .transitive_dependencies(file)
      .into_iter()
      .collect(),
  })
}

#[cfg(test)]
pub(crate) mod tests {
  use crate::cache::Cache;
  use crate::eval::Interpreter;
  use crate::host::FileId;
  use crate::host::HostError;
  use crate::host::Loader;
  use crate::host::Resolver;
  use crate::options::Options;
  use crate::services::Services;
  use crate::tags::CssTags;
  use std::collections::HashMap;
  use std::path::Path;
  use std::sync::Arc;

  /// In-memory files. `./x.js` and `../x.js` resolve relative to the importer, bare specifiers to
  /// `/node_modules/<name>.js`.
  pub struct TestHost {
    files: HashMap<FileId, Arc<str>>,
    pub interpreter: Interpreter,
    pub tags: CssTags,
    pub options: Options,
  }

  impl TestHost {
    pub fn new(files: &[(&str, &str)]) -> TestHost {
      TestHost::with_options(files, Options::default())
    }

    pub fn with_options(files: &[(&str, &str)], options: Options) -> TestHost {
      TestHost {
        files: files
          .iter()
          .map(|(name, text)| (FileId::new(*name), Arc::from(*text)))
          .collect(),
        interpreter: Interpreter::new(),
        tags: CssTags::from_options(&options),
        options,
      }
    }

    pub fn services<'a>(&'a self, cache: &'a Cache) -> Services<'a> {
      Services::new(cache, self, &self.interpreter, &self.tags, &self.options).unwrap()
    }
  }

  impl Loader for TestHost {
    fn file_text(&self, file: &FileId) -> Result<Arc<str>, HostError> {
      self
        .files
        .get(file)
        .cloned()
        .ok_or_else(|| HostError::new(format!("no such file {file}")))
    }
  }

  impl Resolver for TestHost {
    fn resolve(
      &self,
      specifier: &str,
      importer: &FileId,
      _stack: &[FileId],
    ) -> Result<FileId, HostError> {
      let path = if specifier.starts_with('.') {
        let dir = Path::new(importer.as_str()).parent().unwrap_or(Path::new("/"));
        normalize(&dir.join(specifier))
      } else {
        format!("/node_modules/{specifier}.js")
      };
      let file = FileId::new(path);
      if self.files.contains_key(&file) {
        Ok(file)
      } else {
        Err(HostError::new(format!("module {specifier:?} not found")))
      }
    }
  }

  fn normalize(path: &Path) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.iter().filter_map(|p| p.to_str()) {
      match part {
        "/" | "." => {}
        ".." => {
          parts.pop();
        }
        other => parts.push(other),
      }
    }
    format!("/{}", parts.join("/"))
  }

  #[test]
  fn resolves_relative_specifiers() {
    let host = TestHost::new(&[("/src/a.js", ""), ("/lib/b.js", ""), ("/node_modules/m.js", "")]);
    let a = FileId::new("/src/a.js");
    assert_eq!(host.resolve("../lib/b.js", &a, &[]).unwrap(), FileId::new("/lib/b.js"));
    assert_eq!(host.resolve("m", &a, &[]).unwrap(), FileId::new("/node_modules/m.js"));
    assert!(host.resolve("./missing.js", &a, &[]).is_err());
  }
}
