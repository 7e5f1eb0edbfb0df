//! Tagged templates evaluated at build time.

use crate::cache::content_hash;
use crate::host::FileId;
use crate::options::Options;
use crate::value::Value;
use ahash::HashMap;
use ahash::HashMapExt;
use ahash::HashSet;
use ahash::HashSetExt;
use serde::Serialize;
use shaker_js::DependencyGraph;
use syntax_js::ast::Ast;
use syntax_js::ast::ImportName;
use syntax_js::ast::NodeId;
use syntax_js::ast::NodeKind;
use syntax_js::ast::PropKey;
use syntax_js::parse::lit::cook;

/// Export added to a root module to carry the interpolations of its tagged templates.
pub const PREVAL_EXPORT: &str = "__preval";

/// One tagged template of a root module.
#[derive(Clone, Debug)]
pub struct TagSite {
  /// Position among the module's sites, in source order.
  pub index: usize,
  /// The `TaggedTemplate` node.
  pub node: NodeId,
  pub class_name: String,
  pub display_name: String,
  /// Raw template text around the interpolations.
  pub quasis: Vec<String>,
  pub exprs: Vec<NodeId>,
}

impl TagSite {
  /// Property of the `__preval` object holding this site's interpolation thunk.
  pub fn export_key(&self) -> String {
    format!("_exp{}", self.index)
  }
}

#[derive(Clone, Default, Debug)]
pub struct PrevalPlan {
  pub sites: Vec<TagSite>,
  /// Import statements that only bring in tags used by `sites`; removed from the output.
  pub tag_imports: Vec<NodeId>,
}

/// Text extracted from one tagged template.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct Artifact {
  pub class_name: String,
  pub display_name: String,
  pub css: String,
}

pub trait TagProcessor {
  /// Whether importing `imported` from `source` yields a tag.
  fn is_tag(&self, source: &str, imported: &ImportName) -> bool;

  /// Replacement text for the `index`th site of `file`.
  fn class_name(&self, file: &FileId, index: usize, display_name: &str) -> String;

  /// Turns the evaluated interpolations of a site into artifact text.
  fn process(&self, site: &TagSite, values: &[Value]) -> Result<String, String>;
}

/// The `css` tag: every template becomes a class rule.
pub struct CssTags {
  module: String,
  prefix: String,
}

impl CssTags {
  pub fn new(module: impl Into<String>, prefix: impl Into<String>) -> CssTags {
    CssTags {
      module: module.into(),
      prefix: prefix.into(),
    }
  }

  pub fn from_options(options: &Options) -> CssTags {
    CssTags::new(options.tag_module.clone(), options.class_prefix.clone())
  }
}

impl TagProcessor for CssTags {
  fn is_tag(&self, source: &str, imported: &ImportName) -> bool {
    source == self.module && *imported == ImportName::Named("css".to_string())
  }

  fn class_name(&self, file: &FileId, index: usize, display_name: &str) -> String {
    let hash = content_hash(&format!("{file}:{index}"));
    format!("{}{}_{}", self.prefix, display_name, &hash[..8])
  }

  fn process(&self, site: &TagSite, values: &[Value]) -> Result<String, String> {
    let mut text = String::new();
    for (i, quasi) in site.quasis.iter().enumerate() {
      text.push_str(&cook(quasi).unwrap_or_else(|| quasi.clone()));
      let Some(value) = values.get(i) else {
        continue;
      };
      match value {
        Value::Function(_) | Value::Object(_) | Value::Module(_) => {
          return Err(format!(
            "cannot interpolate {} into the styles of {}",
            value.describe(),
            site.display_name
          ));
        }
        other => text.push_str(&other.to_js_string()),
      };
    }
    Ok(format!(".{} {{ {} }}", site.class_name, text.trim()))
  }
}

struct Discovery<'a> {
  ast: &'a Ast,
  graph: &'a DependencyGraph,
  tags: &'a dyn TagProcessor,
  file: &'a FileId,
  tag_bindings: HashSet<NodeId>,
  // Tag references consumed by a site.
  site_tags: HashSet<NodeId>,
  sites: Vec<TagSite>,
}

impl<'a> Discovery<'a> {
  fn visit(&mut self, id: NodeId, display: Option<&'a str>) {
    let ast = self.ast;
    match ast.kind(id) {
      // Code in functions may never run at build time.
      NodeKind::Function { .. } => {}
      NodeKind::TaggedTemplate { tag, template } if self.is_tag_reference(*tag) => {
        let NodeKind::Template { quasis, exprs } = ast.kind(*template) else {
          return;
        };
        let file = self.file;
        let index = self.sites.len();
        let display_name = display.unwrap_or_else(|| file.stem()).to_string();
        self.site_tags.insert(*tag);
        self.sites.push(TagSite {
          index,
          node: id,
          class_name: self.tags.class_name(file, index, &display_name),
          display_name,
          quasis: quasis.clone(),
          exprs: exprs.clone(),
        });
      }
      NodeKind::VarDeclarator {
        binding,
        init: Some(init),
      } => {
        let name = ast.binding_name(*binding).or(display);
        self.visit(*init, name);
      }
      NodeKind::Property {
        key: PropKey::Name(key),
        value,
        ..
      } => self.visit(*value, Some(key.as_str())),
      _ => {
        for child in ast.children(id) {
          self.visit(child, display);
        }
      }
    };
  }

  fn is_tag_reference(&self, tag: NodeId) -> bool {
    matches!(self.ast.kind(tag), NodeKind::Ident { .. })
      && self
        .graph
        .declaration_of(tag)
        .is_some_and(|binding| self.tag_bindings.contains(&binding))
  }
}

/// Finds the tagged templates of a module whose tag is an unshadowed tag import, outside of any
/// function.
pub fn discover(
  tags: &dyn TagProcessor,
  file: &FileId,
  ast: &Ast,
  graph: &DependencyGraph,
) -> PrevalPlan {
  // Import statement of each tag binding, and whether the statement imports tags only.
  let mut tag_bindings: HashMap<NodeId, NodeId> = HashMap::new();
  let mut candidates: Vec<(NodeId, bool)> = Vec::new();
  for stmt in ast.top_level_statements() {
    let NodeKind::Import { specifiers, source } = ast.kind(*stmt) else {
      continue;
    };
    let mut only_tags = !specifiers.is_empty();
    for spec in specifiers {
      let NodeKind::ImportSpecifier { imported, binding } = ast.kind(*spec) else {
        continue;
      };
      if tags.is_tag(source, imported) {
        tag_bindings.insert(*binding, *stmt);
      } else {
        only_tags = false;
      }
    }
    candidates.push((*stmt, only_tags));
  }
  if tag_bindings.is_empty() {
    return PrevalPlan::default();
  }

  let mut discovery = Discovery {
    ast,
    graph,
    tags,
    file,
    tag_bindings: tag_bindings.keys().copied().collect(),
    site_tags: HashSet::new(),
    sites: Vec::new(),
  };
  discovery.visit(ast.root(), None);

  // An import stays if any of its tags is used other than as the tag of a site.
  let mut still_used: HashSet<NodeId> = HashSet::new();
  for id in ast.reachable() {
    if !matches!(ast.kind(id), NodeKind::Ident { .. }) || discovery.site_tags.contains(&id) {
      continue;
    }
    if let Some(stmt) = graph
      .declaration_of(id)
      .and_then(|binding| tag_bindings.get(&binding))
    {
      still_used.insert(*stmt);
    }
  }
  let tag_imports = candidates
    .into_iter()
    .filter(|(stmt, only_tags)| *only_tags && !still_used.contains(stmt))
    .map(|(stmt, _)| stmt)
    .collect();

  PrevalPlan {
    sites: discovery.sites,
    tag_imports,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use shaker_js::build_graph;

  fn plan(source: &str) -> (Ast, PrevalPlan) {
    let ast = syntax_js::parse(source).unwrap();
    let graph = build_graph(&ast);
    let tags = CssTags::new("@preval/css", "");
    let plan = discover(&tags, &FileId::new("/src/button.js"), &ast, &graph);
    (ast, plan)
  }

  #[test]
  fn finds_top_level_sites_with_display_names() {
    let (_, plan) = plan(
      r#"import { css } from "@preval/css";
const title = css`color: red;`;
export const styles = { root: css`margin: ${1 + 1}px;` };
css`display: none;`;
"#,
    );
    let names: Vec<&str> = plan.sites.iter().map(|s| s.display_name.as_str()).collect();
    assert_eq!(names, vec!["title", "root", "button"]);
    assert_eq!(plan.sites[1].exprs.len(), 1);
    assert!(plan.sites[0].class_name.starts_with("title_"));
    assert_eq!(plan.sites[0].class_name.len(), "title_".len() + 8);
    assert_eq!(plan.tag_imports.len(), 1);
  }

  #[test]
  fn skips_functions_shadowing_and_foreign_tags() {
    let (_, plan) = plan(
      r#"import { css } from "@preval/css";
import { css as other } from "elsewhere";
const lazy = () => css`color: red;`;
const a = other`x`;
"#,
    );
    assert!(plan.sites.is_empty());
    // The tag is still referenced from the function, so its import stays.
    assert!(plan.tag_imports.is_empty());
  }

  #[test]
  fn renders_css_rules() {
    let tags = CssTags::new("@preval/css", "p-");
    let site = TagSite {
      index: 0,
      node: NodeId(0),
      class_name: "p-title_0000abcd".to_string(),
      display_name: "title".to_string(),
      quasis: vec!["\n  color: ".to_string(), ";\n  width: ".to_string(), "px;\n".to_string()],
      exprs: Vec::new(),
    };
    let css = tags
      .process(&site, &[Value::from("red"), Value::Number(10.0)])
      .unwrap();
    assert_eq!(css, ".p-title_0000abcd { color: red;\n  width: 10px; }");
    assert!(tags.process(&site, &[Value::native("f", |_| Ok(Value::Null))]).is_err());
    assert!(tags.class_name(&FileId::new("/a.js"), 0, "x").starts_with("p-x_"));
  }
}
