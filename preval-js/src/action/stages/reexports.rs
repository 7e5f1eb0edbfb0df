use super::outputs;
use super::parse;
use super::single;
use super::source_of;
use super::unexpected;
use super::wrong_data;
use crate::action::ActionData;
use crate::action::ActionKind;
use crate::action::ActionOutput;
use crate::action::ActionRequest;
use crate::action::Resume;
use crate::action::Stage;
use crate::action::Step;
use crate::entrypoint::Entrypoint;
use crate::error::PipelineError;
use crate::host::FileId;
use crate::services::Services;
use shaker_js::build_graph;
use std::collections::BTreeSet;
use std::rc::Rc;
use syntax_js::ast::Ast;
use syntax_js::ast::NodeId;
use syntax_js::ast::NodeKind;
use tracing::debug;

fn unique_sources<'a>(sources: impl IntoIterator<Item = &'a String>) -> Vec<String> {
  let mut out: Vec<String> = Vec::new();
  for source in sources {
    if !out.contains(source) {
      out.push(source.clone());
    }
  }
  out
}

fn optional(specifiers: &[String]) -> Vec<(String, bool)> {
  specifiers.iter().map(|s| (s.clone(), false)).collect()
}

enum ExplodeState {
  Start,
  Resolving {
    ast: Ast,
    local: BTreeSet<String>,
    targets: Vec<(NodeId, String)>,
  },
  Collecting {
    ast: Ast,
    local: BTreeSet<String>,
    targets: Vec<(NodeId, String)>,
  },
  Done,
}

/// Replaces every un-aliased `export * from "m"` with an explicit `export { … } from "m"` listing
/// the names `m` provides, so the shaker can request exactly the names that are used.
pub struct ExplodeReexports {
  entrypoint: Rc<Entrypoint>,
  state: ExplodeState,
}

impl ExplodeReexports {
  pub fn new(entrypoint: Rc<Entrypoint>) -> ExplodeReexports {
    ExplodeReexports {
      entrypoint,
      state: ExplodeState::Start,
    }
  }
}

impl Stage for ExplodeReexports {
  fn resume(&mut self, services: &Services, input: Resume) -> Result<Step, PipelineError> {
    const KIND: ActionKind = ActionKind::ExplodeReexports;
    let entrypoint = &self.entrypoint;
    match std::mem::replace(&mut self.state, ExplodeState::Done) {
      ExplodeState::Start => {
        let ast = parse(services, &entrypoint.name, &entrypoint.source)?;
        if entrypoint.ignored {
          return Ok(Step::Done(ActionOutput::Ast(ast)));
        }
        let graph = build_graph(&ast);
        let targets: Vec<(NodeId, String)> = graph
          .reexports()
          .iter()
          .map(|(source, node)| (*node, source.clone()))
          .collect();
        if targets.is_empty() {
          return Ok(Step::Done(ActionOutput::Ast(ast)));
        }
        let local = graph.exports().keys().cloned().collect();
        let specifiers = optional(&unique_sources(targets.iter().map(|(_, s)| s)));
        let request = ActionRequest::new(ActionKind::ResolveImports, entrypoint, ActionData::Resolve {
          importer: entrypoint.name.clone(),
          specifiers,
        });
        self.state = ExplodeState::Resolving {
          ast,
          local,
          targets,
        };
        Ok(Step::Next(vec![request]))
      }
      ExplodeState::Resolving {
        ast,
        local,
        targets,
      } => {
        let resolved = single(KIND, input)?
          .into_resolved()
          .ok_or_else(|| unexpected(KIND))?;
        let mut requests = Vec::new();
        let mut kept = Vec::new();
        for (node, source) in targets {
          let Some(file) = resolved.get(&source) else {
            debug!(file = %entrypoint.name, %source, "leaving unresolved export * in place");
            continue;
          };
          requests.push(ActionRequest::new(ActionKind::GetExports, entrypoint, ActionData::ExportsOf {
            file: file.clone(),
            stack: vec![entrypoint.name.clone()],
          }));
          kept.push((node, source));
        }
        if requests.is_empty() {
          return Ok(Step::Done(ActionOutput::Ast(ast)));
        }
        self.state = ExplodeState::Collecting {
          ast,
          local,
          targets: kept,
        };
        Ok(Step::Next(requests))
      }
      ExplodeState::Collecting {
        mut ast,
        local,
        targets,
      } => {
        let results = outputs(KIND, input)?;
        if results.len() != targets.len() {
          return Err(unexpected(KIND));
        }
        // A name provided by the module itself, or by an earlier `export *`, shadows later ones.
        let mut seen = local;
        for ((node, source), result) in targets.into_iter().zip(results) {
          let (names, _) = result.into_export_names().ok_or_else(|| unexpected(KIND))?;
          let loc = ast.loc(node);
          let mut specifiers = Vec::new();
          for name in names.iter() {
            if name == "default" || !seen.insert(name.clone()) {
              continue;
            }
            let local = ast.push(loc, NodeKind::Ident { name: name.clone() });
            specifiers.push(ast.push(loc, NodeKind::ExportSpecifier {
              local,
              exported: name.clone(),
            }));
          }
          debug!(file = %entrypoint.name, %source, count = specifiers.len(), "exploded export *");
          ast.replace(node, NodeKind::ExportList {
            specifiers,
            from: Some(source),
          });
        }
        Ok(Step::Done(ActionOutput::Ast(ast)))
      }
      ExplodeState::Done => Err(unexpected(KIND)),
    }
  }
}

enum ExportsState {
  Start,
  Resolving { own: Vec<String>, sources: Vec<String> },
  Collecting { own: Vec<String> },
  Done,
}

/// Export names of a file, following `export *` chains.
///
/// `stack` holds the files already visited along the current chain; a file found on it contributes
/// nothing, and the partial answer is not cached.
pub struct GetExports {
  entrypoint: Rc<Entrypoint>,
  file: FileId,
  stack: Vec<FileId>,
  state: ExportsState,
}

impl GetExports {
  pub fn new(entrypoint: Rc<Entrypoint>, data: ActionData) -> Result<GetExports, PipelineError> {
    match data {
      ActionData::ExportsOf { file, stack } => Ok(GetExports {
        entrypoint,
        file,
        stack,
        state: ExportsState::Start,
      }),
      other => Err(wrong_data(ActionKind::GetExports, &other)),
    }
  }

  fn finish(&self, services: &Services, names: Vec<String>, complete: bool) -> Step {
    let names = Rc::new(names);
    if complete {
      services.cache.set_export_names(&self.file, names.clone());
    }
    Step::Done(ActionOutput::ExportNames(names, complete))
  }
}

impl Stage for GetExports {
  fn resume(&mut self, services: &Services, input: Resume) -> Result<Step, PipelineError> {
    const KIND: ActionKind = ActionKind::GetExports;
    match std::mem::replace(&mut self.state, ExportsState::Done) {
      ExportsState::Start => {
        if self.stack.contains(&self.file) {
          debug!(file = %self.file, "export * cycle");
          return Ok(Step::Done(ActionOutput::ExportNames(Rc::new(Vec::new()), false)));
        }
        if let Some(names) = services.cache.export_names(&self.file) {
          return Ok(Step::Done(ActionOutput::ExportNames(names, true)));
        }
        let source = source_of(services, &self.file)?;
        let ast = parse(services, &self.file, &source)?;
        let graph = build_graph(&ast);
        let own: Vec<String> = graph.exports().keys().cloned().collect();
        let sources = unique_sources(graph.reexports().iter().map(|(s, _)| s));
        if sources.is_empty() {
          return Ok(self.finish(services, own, true));
        }
        let request = ActionRequest::new(ActionKind::ResolveImports, &self.entrypoint, ActionData::Resolve {
          importer: self.file.clone(),
          specifiers: optional(&sources),
        });
        self.state = ExportsState::Resolving { own, sources };
        Ok(Step::Next(vec![request]))
      }
      ExportsState::Resolving { own, sources } => {
        let resolved = single(KIND, input)?
          .into_resolved()
          .ok_or_else(|| unexpected(KIND))?;
        let mut stack = self.stack.clone();
        stack.push(self.file.clone());
        let requests: Vec<ActionRequest> = sources
          .iter()
          .filter_map(|source| resolved.get(source))
          .map(|file| {
            ActionRequest::new(ActionKind::GetExports, &self.entrypoint, ActionData::ExportsOf {
              file: file.clone(),
              stack: stack.clone(),
            })
          })
          .collect();
        if requests.is_empty() {
          return Ok(self.finish(services, own, true));
        }
        self.state = ExportsState::Collecting { own };
        Ok(Step::Next(requests))
      }
      ExportsState::Collecting { mut own } => {
        let mut complete = true;
        for result in outputs(KIND, input)? {
          let (names, finished) = result.into_export_names().ok_or_else(|| unexpected(KIND))?;
          complete &= finished;
          for name in names.iter() {
            if name != "default" && !own.contains(name) {
              own.push(name.clone());
            }
          }
        }
        Ok(self.finish(services, own, complete))
      }
      ExportsState::Done => Err(unexpected(KIND)),
    }
  }
}
