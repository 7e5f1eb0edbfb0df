use super::unexpected;
use super::wrong_data;
use crate::action::ActionData;
use crate::action::ActionKind;
use crate::action::ActionOutput;
use crate::action::Resume;
use crate::action::Stage;
use crate::action::Step;
use crate::cache::PreparedModule;
use crate::entrypoint::Entrypoint;
use crate::error::PipelineError;
use crate::eval::ModuleRunner;
use crate::services::Services;
use std::rc::Rc;

/// Evaluates a prepared root module and, on demand, the prepared modules it requires.
pub struct EvalFile {
  entrypoint: Rc<Entrypoint>,
  module: Rc<PreparedModule>,
}

impl EvalFile {
  pub fn new(entrypoint: Rc<Entrypoint>, data: ActionData) -> Result<EvalFile, PipelineError> {
    match data {
      ActionData::Prepared(module) => Ok(EvalFile { entrypoint, module }),
      other => Err(wrong_data(ActionKind::EvalFile, &other)),
    }
  }
}

impl Stage for EvalFile {
  fn resume(&mut self, services: &Services, input: Resume) -> Result<Step, PipelineError> {
    let Resume::Start = input else {
      return Err(unexpected(ActionKind::EvalFile));
    };
    let exports = ModuleRunner::new(services).run(&self.entrypoint, &self.module)?;
    Ok(Step::Done(ActionOutput::Evaluated(exports)))
  }
}
