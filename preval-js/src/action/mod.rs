//! Pipeline stages as resumable actions.
//!
//! Every stage is a state machine implementing [`Stage`]. Each call to [`Stage::resume`] runs until
//! the stage needs the results of other actions ([`Step::Next`]), needs import specifiers resolved
//! ([`Step::Resolve`]) or is finished ([`Step::Done`]). The [`scheduler`] feeds the results back in,
//! so the same stage code runs under the blocking and the non-blocking scheduler.

use crate::cache::PreparedModule;
use crate::entrypoint::Entrypoint;
use crate::entrypoint::EntrypointId;
use crate::error::PipelineError;
use crate::exports::Exports;
use crate::host::FileId;
use crate::host::HostError;
use crate::services::Services;
use crate::tags::Artifact;
use crate::tags::PrevalPlan;
use crate::TransformOutput;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt::Write;
use std::rc::Rc;
use syntax_js::ast::Ast;

pub mod abort;
pub mod queue;
pub mod scheduler;
mod stages;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ActionKind {
  AddToCodeCache,
  Collect,
  EvalFile,
  ExplodeReexports,
  Extract,
  GetExports,
  ProcessEntrypoint,
  ProcessImports,
  ResolveImports,
  Transform,
  Workflow,
}

impl ActionKind {
  /// Higher runs first.
  pub fn weight(self) -> u8 {
    match self {
      ActionKind::ResolveImports => 50,
      ActionKind::GetExports => 45,
      ActionKind::ProcessImports => 40,
      ActionKind::Workflow => 35,
      ActionKind::Extract => 30,
      ActionKind::Collect => 25,
      ActionKind::EvalFile => 20,
      ActionKind::ProcessEntrypoint => 15,
      ActionKind::ExplodeReexports => 10,
      ActionKind::Transform => 5,
      ActionKind::AddToCodeCache => 0,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      ActionKind::AddToCodeCache => "addToCodeCache",
      ActionKind::Collect => "collect",
      ActionKind::EvalFile => "evalFile",
      ActionKind::ExplodeReexports => "explodeReexports",
      ActionKind::Extract => "extract",
      ActionKind::GetExports => "getExports",
      ActionKind::ProcessEntrypoint => "processEntrypoint",
      ActionKind::ProcessImports => "processImports",
      ActionKind::ResolveImports => "resolveImports",
      ActionKind::Transform => "transform",
      ActionKind::Workflow => "workflow",
    }
  }
}

/// Identity of an action for deduplication: two requests with equal keys share one execution.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ActionKey {
  pub kind: ActionKind,
  pub entrypoint: EntrypointId,
  pub data: String,
}

/// Stage-specific input.
#[derive(Clone, Debug)]
pub enum ActionData {
  None,
  /// Specifiers imported by `importer`; the flag marks specifiers whose failure is an error.
  Resolve {
    importer: FileId,
    specifiers: Vec<(String, bool)>,
  },
  /// Export names of `file`, reached through the `export *` chain in `stack`.
  ExportsOf { file: FileId, stack: Vec<FileId> },
  /// Tree to transform, after re-export explosion.
  Ast(Ast),
  /// Resolved dependency to the names requested from it.
  Imports(Rc<BTreeMap<FileId, BTreeSet<String>>>),
  Prepared(Rc<PreparedModule>),
  /// Evaluated tag values of a root module, ready to be spliced into its source.
  Extract {
    module: Rc<PreparedModule>,
    artifacts: Rc<Vec<Artifact>>,
  },
}

impl ActionData {
  // Stages whose data is derived from the entrypoint alone key on the entrypoint only.
  fn key(&self) -> String {
    match self {
      ActionData::Resolve {
        importer,
        specifiers,
      } => {
        let mut key = importer.to_string();
        for (specifier, required) in specifiers {
          let _ = write!(key, "|{}{}", if *required { "!" } else { "?" }, specifier);
        }
        key
      }
      ActionData::ExportsOf { file, stack } => {
        let mut key = file.to_string();
        for f in stack {
          let _ = write!(key, "<{f}");
        }
        key
      }
      _ => String::new(),
    }
  }
}

#[derive(Clone, Debug)]
pub struct ActionRequest {
  pub kind: ActionKind,
  pub entrypoint: Rc<Entrypoint>,
  pub data: ActionData,
}

impl ActionRequest {
  pub fn new(kind: ActionKind, entrypoint: &Rc<Entrypoint>, data: ActionData) -> ActionRequest {
    ActionRequest {
      kind,
      entrypoint: entrypoint.clone(),
      data,
    }
  }

  pub fn key(&self) -> ActionKey {
    ActionKey {
      kind: self.kind,
      entrypoint: self.entrypoint.id,
      data: self.data.key(),
    }
  }
}

/// Result of the `transform` stage.
#[derive(Debug)]
pub struct Transformed {
  pub ast: Ast,
  pub code: String,
  pub imports: BTreeMap<String, BTreeSet<String>>,
  pub preval: Option<Rc<PrevalPlan>>,
}

#[derive(Clone, Debug)]
pub enum ActionOutput {
  Unit,
  Ast(Ast),
  Transformed(Rc<Transformed>),
  Resolved(Rc<BTreeMap<String, FileId>>),
  /// Export names, and whether the list is complete (no `export *` cycle cut it short).
  ExportNames(Rc<Vec<String>>, bool),
  Prepared(Rc<PreparedModule>),
  Evaluated(Rc<Exports>),
  Artifacts(Rc<Vec<Artifact>>),
  Output(Rc<TransformOutput>),
}

impl ActionOutput {
  pub fn into_ast(self) -> Option<Ast> {
    match self {
      ActionOutput::Ast(ast) => Some(ast),
      _ => None,
    }
  }

  pub fn into_transformed(self) -> Option<Rc<Transformed>> {
    match self {
      ActionOutput::Transformed(t) => Some(t),
      _ => None,
    }
  }

  pub fn into_resolved(self) -> Option<Rc<BTreeMap<String, FileId>>> {
    match self {
      ActionOutput::Resolved(r) => Some(r),
      _ => None,
    }
  }

  pub fn into_export_names(self) -> Option<(Rc<Vec<String>>, bool)> {
    match self {
      ActionOutput::ExportNames(n, complete) => Some((n, complete)),
      _ => None,
    }
  }

  pub fn into_prepared(self) -> Option<Rc<PreparedModule>> {
    match self {
      ActionOutput::Prepared(m) => Some(m),
      _ => None,
    }
  }

  pub fn into_evaluated(self) -> Option<Rc<Exports>> {
    match self {
      ActionOutput::Evaluated(e) => Some(e),
      _ => None,
    }
  }

  pub fn into_artifacts(self) -> Option<Rc<Vec<Artifact>>> {
    match self {
      ActionOutput::Artifacts(a) => Some(a),
      _ => None,
    }
  }

  pub fn into_output(self) -> Option<Rc<TransformOutput>> {
    match self {
      ActionOutput::Output(o) => Some(o),
      _ => None,
    }
  }
}

pub type Outcome = Result<ActionOutput, PipelineError>;

#[derive(Clone, Debug)]
pub struct ResolveRequest {
  pub specifier: String,
  pub importer: FileId,
  pub stack: Vec<FileId>,
}

pub enum Step {
  /// Suspend until every requested action is done; resumed with their outputs in order.
  Next(Vec<ActionRequest>),
  /// Suspend until every specifier is resolved; resumed with the results in order.
  Resolve(Vec<ResolveRequest>),
  Done(ActionOutput),
}

pub enum Resume {
  Start,
  Actions(Vec<ActionOutput>),
  Resolved(Vec<Result<FileId, HostError>>),
}

pub trait Stage {
  fn resume(&mut self, services: &Services, input: Resume) -> Result<Step, PipelineError>;
}

pub fn stage_for(request: &ActionRequest) -> Box<dyn Stage> {
  stages::stage_for(request)
}
