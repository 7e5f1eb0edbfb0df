//! Execution of prepared modules.

use crate::cache::PreparedModule;
use crate::entrypoint::Entrypoint;
use crate::error::EvalError;
use crate::exports::Exports;
use crate::host::FileId;
use crate::services::Services;
use ahash::HashMap;
use ahash::HashMapExt;
use std::rc::Rc;
use tracing::debug;
use tracing::trace;

mod interp;

pub use interp::Interpreter;

/// Runs the code of one prepared module.
///
/// `require` maps an import specifier of the module to the exports of the imported module,
/// evaluating it first if needed. Implementations populate `exports` and may leave values as
/// deferred getters for bindings initialized later.
pub trait Evaluator {
  fn execute(
    &self,
    module: &PreparedModule,
    exports: &Rc<Exports>,
    require: &mut dyn FnMut(&str) -> Result<Rc<Exports>, EvalError>,
  ) -> Result<(), EvalError>;
}

/// Evaluates a module graph from the code cache, once per module per run.
pub(crate) struct ModuleRunner<'s, 'a> {
  services: &'s Services<'a>,
  // Modules entered during this run. A module required again while it is still running (an import
  // cycle) gets its partially populated exports.
  entered: HashMap<FileId, Rc<Exports>>,
}

impl<'s, 'a> ModuleRunner<'s, 'a> {
  pub fn new(services: &'s Services<'a>) -> ModuleRunner<'s, 'a> {
    ModuleRunner {
      services,
      entered: HashMap::new(),
    }
  }

  pub fn run(
    &mut self,
    entrypoint: &Rc<Entrypoint>,
    module: &Rc<PreparedModule>,
  ) -> Result<Rc<Exports>, EvalError> {
    let exports = entrypoint.exports().clone();
    self.entered.insert(module.file.clone(), exports.clone());
    if entrypoint.is_evaluated(&module.only) {
      trace!(file = %module.file, "already evaluated");
      return Ok(exports);
    }
    debug!(file = %module.file, only = ?module.only, "evaluating");
    let evaluator = self.services.evaluator;
    evaluator
      .execute(module, &exports, &mut |specifier: &str| self.require(module, specifier))
      .map_err(|e| e.within(&module.file))?;
    entrypoint.mark_evaluated(&module.only);
    Ok(exports)
  }

  fn require(&mut self, importer: &PreparedModule, specifier: &str) -> Result<Rc<Exports>, EvalError> {
    let Some(file) = importer.resolved.get(specifier) else {
      // Unresolvable side-effect imports were dropped with a warning.
      if importer.imports.get(specifier).is_some_and(|names| names.is_empty()) {
        return Ok(Rc::new(Exports::new()));
      }
      return Err(EvalError::new(format!("cannot find module {specifier:?}")));
    };
    if let Some(exports) = self.entered.get(file) {
      return Ok(exports.clone());
    }
    let cache = self.services.cache;
    let (Some(entrypoint), Some(module)) = (cache.entrypoint(file), cache.code(file)) else {
      return Err(EvalError::new(format!("{file} was never prepared")));
    };
    self.run(&entrypoint.latest(), &module)
  }
}
