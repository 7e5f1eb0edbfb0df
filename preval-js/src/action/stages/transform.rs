use super::unexpected;
use super::wrong_data;
use crate::action::ActionData;
use crate::action::ActionKind;
use crate::action::ActionOutput;
use crate::action::Resume;
use crate::action::Stage;
use crate::action::Step;
use crate::action::Transformed;
use crate::entrypoint::Entrypoint;
use crate::error::PipelineError;
use crate::services::Services;
use crate::tags::discover;
use crate::tags::PrevalPlan;
use crate::tags::PREVAL_EXPORT;
use shaker_js::build_graph;
use shaker_js::shake;
use shaker_js::shake_with_graph;
use shaker_js::DependencyGraph;
use shaker_js::ShakeOptions;
use shaker_js::WILDCARD;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::rc::Rc;
use syntax_js::ast::Ast;
use syntax_js::ast::NodeKind;
use syntax_js::ast::PropKey;
use syntax_js::ast::VarDeclMode;
use syntax_js::loc::Loc;
use tracing::debug;

/// Shakes a module down to the exports its entrypoint requests. A root module asking for
/// `__preval` first has its tagged templates rewritten into that export.
pub struct Transform {
  entrypoint: Rc<Entrypoint>,
  ast: Ast,
}

impl Transform {
  pub fn new(entrypoint: Rc<Entrypoint>, data: ActionData) -> Result<Transform, PipelineError> {
    match data {
      ActionData::Ast(ast) => Ok(Transform { entrypoint, ast }),
      other => Err(wrong_data(ActionKind::Transform, &other)),
    }
  }
}

// Ignored files are evaluated whole, so every name of every import is needed.
fn pass_through(ast: Ast, graph: &DependencyGraph) -> Transformed {
  let mut imports: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
  let everything = || [WILDCARD.to_string()].into_iter().collect::<BTreeSet<_>>();
  for record in graph.imports() {
    imports.insert(record.source.clone(), everything());
  }
  for (source, _) in graph.reexports() {
    imports.insert(source.clone(), everything());
  }
  for (source, _) in graph.side_effect_imports() {
    imports.entry(source.clone()).or_default();
  }
  Transformed {
    code: ast.source().to_string(),
    ast,
    imports,
    preval: None,
  }
}

/// Replaces every tagged template with its class name, and appends
/// `export const __preval = { _exp0: () => [...], ... };` holding the interpolations.
fn apply_preval(ast: &mut Ast, plan: &PrevalPlan) {
  let end = ast.source().len();
  let loc = Loc(end, end);
  let mut props = Vec::with_capacity(plan.sites.len());
  for site in &plan.sites {
    ast.replace(site.node, NodeKind::Str {
      value: site.class_name.clone(),
    });
    let elements = ast.push(loc, NodeKind::Array {
      elements: site.exprs.clone(),
    });
    let thunk = ast.push(loc, NodeKind::Function {
      name: None,
      params: Vec::new(),
      body: elements,
      arrow: true,
      decl: false,
    });
    props.push(ast.push(loc, NodeKind::Property {
      key: PropKey::Name(site.export_key()),
      value: thunk,
      shorthand: false,
    }));
  }
  let object = ast.push(loc, NodeKind::Object { props });
  let binding = ast.push(loc, NodeKind::Binding {
    name: PREVAL_EXPORT.to_string(),
  });
  let declarator = ast.push(loc, NodeKind::VarDeclarator {
    binding,
    init: Some(object),
  });
  let decl = ast.push(loc, NodeKind::VarDecl {
    mode: VarDeclMode::Const,
    declarators: vec![declarator],
  });
  let export = ast.push(loc, NodeKind::ExportDecl { decl });
  let mut body = ast.top_level_statements().to_vec();
  body.push(export);
  let root = ast.root();
  ast.replace(root, NodeKind::Program { body });
}

impl Stage for Transform {
  fn resume(&mut self, services: &Services, input: Resume) -> Result<Step, PipelineError> {
    let Resume::Start = input else {
      return Err(unexpected(ActionKind::Transform));
    };
    let entrypoint = &self.entrypoint;
    let mut ast = self.ast.clone();
    let graph = build_graph(&ast);
    if entrypoint.ignored {
      debug!(file = %entrypoint.name, "ignored, passing through");
      let transformed = pass_through(ast, &graph);
      return Ok(Step::Done(ActionOutput::Transformed(Rc::new(transformed))));
    }

    let mut preval = None;
    let mut patched = false;
    if entrypoint.parent.is_none() && entrypoint.only.contains(PREVAL_EXPORT) {
      let plan = discover(services.tags, &entrypoint.name, &ast, &graph);
      debug!(file = %entrypoint.name, sites = plan.sites.len(), "discovered tagged templates");
      if !plan.sites.is_empty() {
        apply_preval(&mut ast, &plan);
        patched = true;
      }
      preval = Some(Rc::new(plan));
    }

    let only = (!entrypoint.requests_everything()).then_some(&entrypoint.only);
    let options = ShakeOptions {
      keep_side_effect_imports: services.options.keep_side_effect_imports,
    };
    let shaken = if patched {
      shake(&ast, only, &options)
    } else {
      shake_with_graph(&ast, &graph, only, &options)
    };
    debug!(
      file = %entrypoint.name,
      only = ?entrypoint.only,
      imports = shaken.imports.len(),
      "shaken"
    );
    Ok(Step::Done(ActionOutput::Transformed(Rc::new(Transformed {
      ast: shaken.ast,
      code: shaken.code,
      imports: shaken.imports,
      preval,
    }))))
  }
}
