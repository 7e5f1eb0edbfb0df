use super::unexpected;
use super::wrong_data;
use crate::action::ActionData;
use crate::action::ActionKind;
use crate::action::ActionOutput;
use crate::action::ResolveRequest;
use crate::action::Resume;
use crate::action::Stage;
use crate::action::Step;
use crate::entrypoint::Entrypoint;
use crate::error::PipelineError;
use crate::host::FileId;
use crate::services::Services;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::trace;
use tracing::warn;

/// Maps the specifiers imported by one file to files, through the resolution cache and then the
/// host resolver.
pub struct ResolveImports {
  entrypoint: Rc<Entrypoint>,
  importer: FileId,
  specifiers: Vec<(String, bool)>,
  pending: Vec<(String, bool)>,
  resolved: BTreeMap<String, FileId>,
}

impl ResolveImports {
  pub fn new(entrypoint: Rc<Entrypoint>, data: ActionData) -> Result<ResolveImports, PipelineError> {
    match data {
      ActionData::Resolve {
        importer,
        specifiers,
      } => Ok(ResolveImports {
        entrypoint,
        importer,
        specifiers,
        pending: Vec::new(),
        resolved: BTreeMap::new(),
      }),
      other => Err(wrong_data(ActionKind::ResolveImports, &other)),
    }
  }

  fn done(&mut self) -> Step {
    Step::Done(ActionOutput::Resolved(Rc::new(std::mem::take(
      &mut self.resolved,
    ))))
  }
}

impl Stage for ResolveImports {
  fn resume(&mut self, services: &Services, input: Resume) -> Result<Step, PipelineError> {
    match input {
      Resume::Start => {
        for (specifier, required) in &self.specifiers {
          match services.cache.resolved(&self.importer, specifier) {
            Some(file) => {
              self.resolved.insert(specifier.clone(), file);
            }
            None => self.pending.push((specifier.clone(), *required)),
          };
        }
        if self.pending.is_empty() {
          return Ok(self.done());
        }
        let stack = self.entrypoint.stack();
        Ok(Step::Resolve(
          self
            .pending
            .iter()
            .map(|(specifier, _)| ResolveRequest {
              specifier: specifier.clone(),
              importer: self.importer.clone(),
              stack: stack.clone(),
            })
            .collect(),
        ))
      }
      Resume::Resolved(results) => {
        if results.len() != self.pending.len() {
          return Err(unexpected(ActionKind::ResolveImports));
        }
        let pending = std::mem::take(&mut self.pending);
        for ((specifier, required), result) in pending.into_iter().zip(results) {
          match result {
            Ok(file) => {
              trace!(importer = %self.importer, %specifier, %file, "resolved");
              services.cache.set_resolved(&self.importer, &specifier, file.clone());
              self.resolved.insert(specifier, file);
            }
            Err(err) if required => {
              return Err(PipelineError::Resolve {
                specifier,
                importer: self.importer.clone(),
                message: err.message().to_string(),
              });
            }
            Err(err) => {
              warn!(importer = %self.importer, %specifier, error = %err, "dropping unresolvable import");
            }
          };
        }
        Ok(self.done())
      }
      Resume::Actions(_) => Err(unexpected(ActionKind::ResolveImports)),
    }
  }
}
