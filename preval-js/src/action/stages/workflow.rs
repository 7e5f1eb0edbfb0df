use super::single;
use super::unexpected;
use super::wrong_data;
use crate::action::ActionData;
use crate::action::ActionKind;
use crate::action::ActionOutput;
use crate::action::ActionRequest;
use crate::action::Resume;
use crate::action::Stage;
use crate::action::Step;
use crate::cache::PreparedModule;
use crate::entrypoint::Entrypoint;
use crate::error::PipelineError;
use crate::services::Services;
use crate::tags::Artifact;
use crate::tags::PREVAL_EXPORT;
use crate::TransformOutput;
use std::rc::Rc;
use syntax_js::emit::emit_string_literal_double_quoted;
use syntax_js::loc::Loc;
use tracing::debug;

fn output(
  services: &Services,
  entrypoint: &Entrypoint,
  code: String,
  artifacts: Vec<Artifact>,
) -> TransformOutput {
  TransformOutput {
    code,
    artifacts,
    dependencies: services
      .cache
      .transitive_dependencies(&entrypoint.name)
      .into_iter()
      .collect(),
  }
}

enum WorkflowState {
  Start,
  Processing,
  Evaluating(Rc<PreparedModule>),
  Collecting(Rc<PreparedModule>),
  Extracting,
  Done,
}

/// Root of a transform: prepare the module graph, evaluate the tag interpolations, and splice the
/// results back into the source.
pub struct Workflow {
  entrypoint: Rc<Entrypoint>,
  state: WorkflowState,
}

impl Workflow {
  pub fn new(entrypoint: Rc<Entrypoint>) -> Workflow {
    Workflow {
      entrypoint,
      state: WorkflowState::Start,
    }
  }

  fn next(&mut self, state: WorkflowState, kind: ActionKind, data: ActionData) -> Step {
    self.state = state;
    Step::Next(vec![ActionRequest::new(kind, &self.entrypoint, data)])
  }
}

impl Stage for Workflow {
  fn resume(&mut self, services: &Services, input: Resume) -> Result<Step, PipelineError> {
    const KIND: ActionKind = ActionKind::Workflow;
    match std::mem::replace(&mut self.state, WorkflowState::Done) {
      WorkflowState::Start => Ok(self.next(
        WorkflowState::Processing,
        ActionKind::ProcessEntrypoint,
        ActionData::None,
      )),
      WorkflowState::Processing => {
        let module = single(KIND, input)?
          .into_prepared()
          .ok_or_else(|| unexpected(KIND))?;
        let has_sites = module.preval.as_ref().is_some_and(|p| !p.sites.is_empty());
        if !has_sites {
          debug!(file = %self.entrypoint.name, "no tagged templates");
          let code = self.entrypoint.source.to_string();
          let out = output(services, &self.entrypoint, code, Vec::new());
          return Ok(Step::Done(ActionOutput::Output(Rc::new(out))));
        }
        Ok(self.next(
          WorkflowState::Evaluating(module.clone()),
          ActionKind::EvalFile,
          ActionData::Prepared(module),
        ))
      }
      WorkflowState::Evaluating(module) => {
        single(KIND, input)?;
        Ok(self.next(
          WorkflowState::Collecting(module.clone()),
          ActionKind::Collect,
          ActionData::Prepared(module),
        ))
      }
      WorkflowState::Collecting(module) => {
        let artifacts = single(KIND, input)?
          .into_artifacts()
          .ok_or_else(|| unexpected(KIND))?;
        Ok(self.next(
          WorkflowState::Extracting,
          ActionKind::Extract,
          ActionData::Extract { module, artifacts },
        ))
      }
      WorkflowState::Extracting => Ok(Step::Done(single(KIND, input)?)),
      WorkflowState::Done => Err(unexpected(KIND)),
    }
  }
}

/// Calls every `_expN` thunk of the evaluated `__preval` export and hands the values to the tag
/// processor.
pub struct Collect {
  entrypoint: Rc<Entrypoint>,
  module: Rc<PreparedModule>,
}

impl Collect {
  pub fn new(entrypoint: Rc<Entrypoint>, data: ActionData) -> Result<Collect, PipelineError> {
    match data {
      ActionData::Prepared(module) => Ok(Collect { entrypoint, module }),
      other => Err(wrong_data(ActionKind::Collect, &other)),
    }
  }
}

impl Stage for Collect {
  fn resume(&mut self, services: &Services, input: Resume) -> Result<Step, PipelineError> {
    let Resume::Start = input else {
      return Err(unexpected(ActionKind::Collect));
    };
    let file = &self.entrypoint.name;
    let Some(plan) = &self.module.preval else {
      return Ok(Step::Done(ActionOutput::Artifacts(Rc::new(Vec::new()))));
    };
    let preval = self
      .entrypoint
      .exports()
      .get(PREVAL_EXPORT)
      .map_err(|e| e.within(file))?;

    let mut artifacts = Vec::with_capacity(plan.sites.len());
    for site in &plan.sites {
      let values = preval
        .property(&site.export_key())
        .and_then(|thunk| thunk.call(Vec::new()))
        .map_err(|e| e.within(file))?;
      let values = values.array_items().ok_or_else(|| PipelineError::Tag {
        file: file.clone(),
        message: format!("interpolations of {} did not evaluate to a list", site.class_name),
      })?;
      let css = services
        .tags
        .process(site, &values)
        .map_err(|message| PipelineError::Tag {
          file: file.clone(),
          message,
        })?;
      artifacts.push(Artifact {
        class_name: site.class_name.clone(),
        display_name: site.display_name.clone(),
        css,
      });
    }
    debug!(%file, count = artifacts.len(), "collected artifacts");
    Ok(Step::Done(ActionOutput::Artifacts(Rc::new(artifacts))))
  }
}

/// Replaces each tagged template of the original source with its class name and drops imports
/// that only brought in tags.
pub struct Extract {
  entrypoint: Rc<Entrypoint>,
  module: Rc<PreparedModule>,
  artifacts: Rc<Vec<Artifact>>,
}

impl Extract {
  pub fn new(entrypoint: Rc<Entrypoint>, data: ActionData) -> Result<Extract, PipelineError> {
    match data {
      ActionData::Extract { module, artifacts } => Ok(Extract {
        entrypoint,
        module,
        artifacts,
      }),
      other => Err(wrong_data(ActionKind::Extract, &other)),
    }
  }
}

// Extends a statement's location over a trailing semicolon and line break.
fn with_line_end(source: &str, loc: Loc) -> Loc {
  let mut end = loc.1;
  if source[end..].starts_with(';') {
    end += 1;
  }
  if source[end..].starts_with("\r\n") {
    end += 2;
  } else if source[end..].starts_with('\n') {
    end += 1;
  }
  Loc(loc.0, end)
}

impl Stage for Extract {
  fn resume(&mut self, services: &Services, input: Resume) -> Result<Step, PipelineError> {
    let Resume::Start = input else {
      return Err(unexpected(ActionKind::Extract));
    };
    let source: &str = &self.entrypoint.source;
    let ast = &self.module.ast;
    let mut edits: Vec<(Loc, String)> = Vec::new();
    if let Some(plan) = &self.module.preval {
      for site in &plan.sites {
        let mut literal = String::new();
        emit_string_literal_double_quoted(&mut literal, &site.class_name);
        edits.push((ast.loc(site.node), literal));
      }
      for stmt in &plan.tag_imports {
        edits.push((with_line_end(source, ast.loc(*stmt)), String::new()));
      }
    }
    edits.sort_by_key(|(loc, _)| loc.0);

    let mut code = String::with_capacity(source.len());
    let mut at = 0;
    for (loc, text) in edits {
      if loc.0 < at {
        continue;
      }
      code.push_str(&source[at..loc.0]);
      code.push_str(&text);
      at = loc.1;
    }
    code.push_str(&source[at..]);

    let out = output(services, &self.entrypoint, code, self.artifacts.to_vec());
    Ok(Step::Done(ActionOutput::Output(Rc::new(out))))
  }
}
