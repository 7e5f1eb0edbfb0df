use super::ActionData;
use super::ActionKind;
use super::ActionOutput;
use super::ActionRequest;
use super::Resume;
use super::Stage;
use super::Step;
use crate::error::PipelineError;
use crate::host::FileId;
use crate::services::Services;
use std::sync::Arc;
use syntax_js::ast::Ast;

mod evaluate;
mod process;
mod reexports;
mod resolve;
mod transform;
mod workflow;

pub fn stage_for(request: &ActionRequest) -> Box<dyn Stage> {
  let entrypoint = request.entrypoint.clone();
  let data = request.data.clone();
  let stage: Result<Box<dyn Stage>, PipelineError> = match request.kind {
    ActionKind::Workflow => Ok(Box::new(workflow::Workflow::new(entrypoint))),
    ActionKind::ProcessEntrypoint => Ok(Box::new(process::ProcessEntrypoint::new(entrypoint))),
    ActionKind::ExplodeReexports => Ok(Box::new(reexports::ExplodeReexports::new(entrypoint))),
    ActionKind::GetExports => reexports::GetExports::new(entrypoint, data).map(boxed),
    ActionKind::Transform => transform::Transform::new(entrypoint, data).map(boxed),
    ActionKind::ResolveImports => resolve::ResolveImports::new(entrypoint, data).map(boxed),
    ActionKind::ProcessImports => process::ProcessImports::new(entrypoint, data).map(boxed),
    ActionKind::AddToCodeCache => process::AddToCodeCache::new(data).map(boxed),
    ActionKind::EvalFile => evaluate::EvalFile::new(entrypoint, data).map(boxed),
    ActionKind::Collect => workflow::Collect::new(entrypoint, data).map(boxed),
    ActionKind::Extract => workflow::Extract::new(entrypoint, data).map(boxed),
  };
  stage.unwrap_or_else(|err| Box::new(Invalid(Some(err))))
}

fn boxed<S: Stage + 'static>(stage: S) -> Box<dyn Stage> {
  Box::new(stage)
}

/// Stage for a request whose data does not fit its kind; fails on first run.
struct Invalid(Option<PipelineError>);

impl Stage for Invalid {
  fn resume(&mut self, _services: &Services, _input: Resume) -> Result<Step, PipelineError> {
    Err(
      self
        .0
        .take()
        .unwrap_or_else(|| PipelineError::Internal("invalid action".to_string())),
    )
  }
}

fn wrong_data(kind: ActionKind, data: &ActionData) -> PipelineError {
  PipelineError::Internal(format!("{} cannot run with {:?}", kind.name(), data))
}

fn unexpected(kind: ActionKind) -> PipelineError {
  PipelineError::Internal(format!("{} resumed with unexpected input", kind.name()))
}

fn outputs(kind: ActionKind, input: Resume) -> Result<Vec<ActionOutput>, PipelineError> {
  match input {
    Resume::Actions(outputs) => Ok(outputs),
    _ => Err(unexpected(kind)),
  }
}

fn single(kind: ActionKind, input: Resume) -> Result<ActionOutput, PipelineError> {
  outputs(kind, input)?
    .into_iter()
    .next()
    .ok_or_else(|| unexpected(kind))
}

fn parse(services: &Services, file: &FileId, source: &str) -> Result<Ast, PipelineError> {
  services
    .cache
    .ast(file, source)
    .map_err(|error| PipelineError::Parse {
      file: file.clone(),
      error,
    })
}

// Source of a file that may not have an entrypoint yet.
fn source_of(services: &Services, file: &FileId) -> Result<Arc<str>, PipelineError> {
  if let Some(entrypoint) = services.cache.entrypoint(file) {
    return Ok(entrypoint.source.clone());
  }
  services
    .loader
    .file_text(file)
    .map_err(|e| PipelineError::Load {
      file: file.clone(),
      message: e.message().to_string(),
    })
}
