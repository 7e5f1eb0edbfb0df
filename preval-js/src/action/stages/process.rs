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
use crate::action::Transformed;
use crate::cache::PreparedModule;
use crate::entrypoint::merge;
use crate::entrypoint::Created;
use crate::entrypoint::Entrypoint;
use crate::error::PipelineError;
use crate::host::FileId;
use crate::services::Services;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::rc::Rc;
use tracing::debug;

enum ProcessState {
  Start,
  Exploding,
  Transforming,
  Resolving(Rc<Transformed>),
  Importing(Rc<Transformed>, Rc<BTreeMap<String, FileId>>),
  Caching(Rc<PreparedModule>),
  Done,
}

/// Turns an entrypoint into a [`PreparedModule`], processing its imports recursively.
pub struct ProcessEntrypoint {
  entrypoint: Rc<Entrypoint>,
  state: ProcessState,
}

impl ProcessEntrypoint {
  pub fn new(entrypoint: Rc<Entrypoint>) -> ProcessEntrypoint {
    ProcessEntrypoint {
      entrypoint,
      state: ProcessState::Start,
    }
  }

  fn next(&mut self, state: ProcessState, kind: ActionKind, data: ActionData) -> Step {
    self.state = state;
    Step::Next(vec![ActionRequest::new(kind, &self.entrypoint, data)])
  }

  fn prepare(
    &mut self,
    transformed: &Transformed,
    resolved: BTreeMap<String, FileId>,
  ) -> Result<Step, PipelineError> {
    let module = Rc::new(PreparedModule {
      file: self.entrypoint.name.clone(),
      only: self.entrypoint.only.clone(),
      ast: transformed.ast.clone(),
      code: transformed.code.clone(),
      imports: transformed.imports.clone(),
      resolved,
      preval: transformed.preval.clone(),
    });
    Ok(self.next(
      ProcessState::Caching(module.clone()),
      ActionKind::AddToCodeCache,
      ActionData::Prepared(module),
    ))
  }
}

impl Stage for ProcessEntrypoint {
  fn resume(&mut self, _services: &Services, input: Resume) -> Result<Step, PipelineError> {
    const KIND: ActionKind = ActionKind::ProcessEntrypoint;
    match std::mem::replace(&mut self.state, ProcessState::Done) {
      ProcessState::Start => Ok(self.next(
        ProcessState::Exploding,
        ActionKind::ExplodeReexports,
        ActionData::None,
      )),
      ProcessState::Exploding => {
        let ast = single(KIND, input)?
          .into_ast()
          .ok_or_else(|| unexpected(KIND))?;
        Ok(self.next(
          ProcessState::Transforming,
          ActionKind::Transform,
          ActionData::Ast(ast),
        ))
      }
      ProcessState::Transforming => {
        let transformed = single(KIND, input)?
          .into_transformed()
          .ok_or_else(|| unexpected(KIND))?;
        if transformed.imports.is_empty() {
          return self.prepare(&transformed, BTreeMap::new());
        }
        let specifiers = transformed
          .imports
          .iter()
          .map(|(specifier, names)| (specifier.clone(), !names.is_empty()))
          .collect();
        let importer = self.entrypoint.name.clone();
        Ok(self.next(
          ProcessState::Resolving(transformed),
          ActionKind::ResolveImports,
          ActionData::Resolve {
            importer,
            specifiers,
          },
        ))
      }
      ProcessState::Resolving(transformed) => {
        let resolved = single(KIND, input)?
          .into_resolved()
          .ok_or_else(|| unexpected(KIND))?;
        let mut imports: BTreeMap<FileId, BTreeSet<String>> = BTreeMap::new();
        for (specifier, names) in &transformed.imports {
          if let Some(file) = resolved.get(specifier) {
            let entry = imports.entry(file.clone()).or_default();
            *entry = merge(entry, names);
          }
        }
        if imports.is_empty() {
          return self.prepare(&transformed, (*resolved).clone());
        }
        Ok(self.next(
          ProcessState::Importing(transformed, resolved),
          ActionKind::ProcessImports,
          ActionData::Imports(Rc::new(imports)),
        ))
      }
      ProcessState::Importing(transformed, resolved) => {
        single(KIND, input)?;
        self.prepare(&transformed, (*resolved).clone())
      }
      ProcessState::Caching(module) => {
        single(KIND, input)?;
        Ok(Step::Done(ActionOutput::Prepared(module)))
      }
      ProcessState::Done => Err(unexpected(KIND)),
    }
  }
}

/// Creates entrypoints for the resolved imports of a module and processes them.
pub struct ProcessImports {
  entrypoint: Rc<Entrypoint>,
  imports: Rc<BTreeMap<FileId, BTreeSet<String>>>,
}

impl ProcessImports {
  pub fn new(entrypoint: Rc<Entrypoint>, data: ActionData) -> Result<ProcessImports, PipelineError> {
    match data {
      ActionData::Imports(imports) => Ok(ProcessImports {
        entrypoint,
        imports,
      }),
      other => Err(wrong_data(ActionKind::ProcessImports, &other)),
    }
  }
}

impl Stage for ProcessImports {
  fn resume(&mut self, services: &Services, input: Resume) -> Result<Step, PipelineError> {
    if !matches!(input, Resume::Start) {
      return Ok(Step::Done(ActionOutput::Unit));
    }
    let entrypoint = &self.entrypoint;
    let mut requests = Vec::new();
    for (file, names) in self.imports.iter() {
      services.cache.add_dependency(&entrypoint.name, file);
      match Entrypoint::create(services, Some(entrypoint), file, names, None)? {
        Created::Created(child) | Created::Cached(child) => requests.push(ActionRequest::new(
          ActionKind::ProcessEntrypoint,
          &child,
          ActionData::None,
        )),
        Created::Loop(child) => {
          debug!(importer = %entrypoint.name, %file, id = %child.id, "import cycle, not descending");
        }
      };
    }
    if requests.is_empty() {
      return Ok(Step::Done(ActionOutput::Unit));
    }
    Ok(Step::Next(requests))
  }
}

pub struct AddToCodeCache {
  module: Rc<PreparedModule>,
}

impl AddToCodeCache {
  pub fn new(data: ActionData) -> Result<AddToCodeCache, PipelineError> {
    match data {
      ActionData::Prepared(module) => Ok(AddToCodeCache { module }),
      other => Err(wrong_data(ActionKind::AddToCodeCache, &other)),
    }
  }
}

impl Stage for AddToCodeCache {
  fn resume(&mut self, services: &Services, _input: Resume) -> Result<Step, PipelineError> {
    services.cache.set_code(self.module.clone());
    Ok(Step::Done(ActionOutput::Unit))
  }
}
