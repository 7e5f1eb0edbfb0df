use crate::cache::Cache;
use crate::error::PipelineError;
use crate::eval::Evaluator;
use crate::host::Loader;
use crate::options::IgnoreRules;
use crate::options::Options;
use crate::tags::TagProcessor;

/// Collaborators and shared state every action of a run can reach.
pub struct Services<'a> {
  pub cache: &'a Cache,
  pub loader: &'a dyn Loader,
  pub evaluator: &'a dyn Evaluator,
  pub tags: &'a dyn TagProcessor,
  pub options: &'a Options,
  pub ignore: IgnoreRules,
}

impl<'a> Services<'a> {
  pub fn new(
    cache: &'a Cache,
    loader: &'a dyn Loader,
    evaluator: &'a dyn Evaluator,
    tags: &'a dyn TagProcessor,
    options: &'a Options,
  ) -> Result<Services<'a>, PipelineError> {
    Ok(Services {
      cache,
      loader,
      evaluator,
      tags,
      options,
      ignore: IgnoreRules::new(&options.ignore)?,
    })
  }
}
