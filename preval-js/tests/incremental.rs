mod common;

use common::file;
use common::MemoryHost;
use preval_js::cache::Cache;
use preval_js::evaluate;
use preval_js::transform;
use serde_json::json;
use std::collections::BTreeSet;

const THEME: &str = r#"export const color = "red";
export const size = 4;
export const shadow = size + "px " + color;
"#;

const BUTTON: &str = r#"import { css } from "@preval/css";
import { color } from "./theme.js";

export const button = css`color: ${color};`;
"#;

#[test]
fn repeated_transforms_reuse_everything() {
  let host = MemoryHost::new(&[("/src/theme.js", THEME), ("/src/button.js", BUTTON)]);
  let cache = Cache::new();
  let services = host.services(&cache);

  let first = transform(&services, &host, &file("/src/button.js"), BUTTON).unwrap();
  let parses = cache.parse_count();
  let resolutions = host.resolutions();
  let second = transform(&services, &host, &file("/src/button.js"), BUTTON).unwrap();
  assert_eq!(first, second);
  assert_eq!(cache.parse_count(), parses);
  assert_eq!(host.resolutions(), resolutions);
}

#[test]
fn wider_requests_extend_without_reparsing() {
  let host = MemoryHost::new(&[("/src/theme.js", THEME)]);
  let cache = Cache::new();
  let services = host.services(&cache);
  let theme = file("/src/theme.js");

  let report = evaluate(&services, &host, &theme, ["color"]).unwrap();
  assert_eq!(report.values["color"], Ok(json!("red")));
  assert_eq!(cache.parse_count(), 1);
  let first = cache.entrypoint(&theme).unwrap();
  assert_eq!(first.generation, 0);

  let report = evaluate(&services, &host, &theme, ["color", "shadow"]).unwrap();
  assert_eq!(report.values["shadow"], Ok(json!("4px red")));
  assert_eq!(cache.parse_count(), 1);
  let second = cache.entrypoint(&theme).unwrap();
  assert_eq!(second.generation, 1);
  assert!(first.is_superseded());
  assert!(second.is_evaluated(&["color".to_string(), "shadow".to_string()].into()));

  // A subset of what was evaluated is served from the live entrypoint.
  evaluate(&services, &host, &theme, ["color"]).unwrap();
  assert_eq!(cache.entrypoint(&theme).unwrap().generation, 1);
  assert_eq!(cache.parse_count(), 1);
}

#[test]
fn evaluates_every_export_on_wildcard() {
  let host = MemoryHost::new(&[("/src/theme.js", THEME)]);
  let cache = Cache::new();
  let services = host.services(&cache);

  let report = evaluate(&services, &host, &file("/src/theme.js"), ["*"]).unwrap();
  let names: Vec<&str> = report.values.keys().map(|k| k.as_str()).collect();
  assert_eq!(names, vec!["color", "shadow", "size"]);
  assert_eq!(report.values["size"], Ok(json!(4)));
}

#[test]
fn content_changes_invalidate_importers() {
  let host = MemoryHost::new(&[("/src/theme.js", THEME), ("/src/button.js", BUTTON)]);
  let cache = Cache::new();
  let services = host.services(&cache);
  let (theme, button) = (file("/src/theme.js"), file("/src/button.js"));

  let before = transform(&services, &host, &button, BUTTON).unwrap();
  assert!(before.artifacts[0].css.contains("color: red;"));

  let changed = THEME.replace("red", "blue");
  host.insert("/src/theme.js", &changed);
  assert!(cache.invalidate_if_changed(&theme, &changed));
  assert!(cache.entrypoint(&button).is_none());
  assert!(cache.code(&theme).is_none());

  let after = transform(&services, &host, &button, BUTTON).unwrap();
  assert!(after.artifacts[0].css.contains("color: blue;"));
  assert_eq!(before.artifacts[0].class_name, after.artifacts[0].class_name);
}

#[test]
fn changed_root_source_replaces_the_entrypoint() {
  let host = MemoryHost::new(&[("/src/theme.js", THEME), ("/src/button.js", BUTTON)]);
  let cache = Cache::new();
  let services = host.services(&cache);
  let button = file("/src/button.js");

  transform(&services, &host, &button, BUTTON).unwrap();
  let edited = BUTTON.replace("color: ${color};", "border-color: ${color};");
  let out = transform(&services, &host, &button, &edited).unwrap();
  assert!(out.artifacts[0].css.contains("border-color: red;"));
  assert_eq!(cache.entrypoint(&button).unwrap().generation, 1);
  // Only the root changed, so the theme was not parsed again.
  assert_eq!(cache.parse_count(), 3);
}

#[test]
fn diamond_requests_widen_the_shared_dependency() {
  // `a` asks `c` for `x` directly and for `y` through `b`.
  let a = r#"import { css } from "@preval/css";
import { x } from "./c.js";
import { b } from "./b.js";
export const k = css`a: ${x}; b: ${b};`;
"#;
  let b = "import { y } from \"./c.js\";\nexport const b = y + 1;\n";
  let c = "export const x = 1;\nexport const y = 10;\nexport const z = missing();\n";
  let host = MemoryHost::new(&[("/src/a.js", a), ("/src/b.js", b), ("/src/c.js", c)]);
  let cache = Cache::new();
  let services = host.services(&cache);

  let out = transform(&services, &host, &file("/src/a.js"), a).unwrap();
  assert_eq!(
    out.artifacts[0].css,
    format!(".{} {{ a: 1; b: 11; }}", out.artifacts[0].class_name)
  );
  assert_eq!(out.dependencies, vec![file("/src/b.js"), file("/src/c.js")]);

  let shared = cache.entrypoint(&file("/src/c.js")).unwrap();
  assert_eq!(shared.generation, 1);
  let module = cache.code(&file("/src/c.js")).unwrap();
  assert_eq!(module.only, BTreeSet::from(["x".to_string(), "y".to_string()]));
  assert!(!module.code.contains("missing"));
  assert_eq!(cache.parse_count(), 3);
}

#[test]
fn import_cycles_terminate() {
  let a = r##"import { css } from "@preval/css";
import { accent } from "./b.js";
export const base = "#fff";
export const card = css`background: ${accent()};`;
"##;
  let b = r#"import { base } from "./a.js";
export const accent = () => "linear-gradient(" + base + ", blue)";
"#;
  let host = MemoryHost::new(&[("/src/a.js", a), ("/src/b.js", b)]);
  let cache = Cache::new();
  let services = host.services(&cache);

  let out = transform(&services, &host, &file("/src/a.js"), a).unwrap();
  assert!(
    out.artifacts[0].css.contains("background: linear-gradient(#fff, blue);"),
    "{}",
    out.artifacts[0].css
  );
  assert_eq!(out.dependencies, vec![file("/src/b.js")]);
}

#[test]
fn self_imports_terminate() {
  let source = r#"import { css } from "@preval/css";
import { gap as g } from "./a.js";
export const gap = 2;
export const a = css`gap: ${g}px;`;
"#;
  let host = MemoryHost::new(&[("/src/a.js", source)]);
  let cache = Cache::new();
  let services = host.services(&cache);

  let out = transform(&services, &host, &file("/src/a.js"), source).unwrap();
  assert!(out.artifacts[0].css.contains("gap: 2px;"), "{}", out.artifacts[0].css);
  assert!(out.dependencies.is_empty());
}

#[test]
fn crossed_import_cycles_terminate() {
  // `b` and `c` are both reached from `a` first, so neither sees the other as an ancestor.
  let a = r#"import { css } from "@preval/css";
import { x } from "./b.js";
import { y } from "./c.js";
export const a = css`a: ${typeof x}; b: ${typeof y};`;
"#;
  let b = "import { y } from \"./c.js\";\nexport const x = () => y;\n";
  let c = "import { x } from \"./b.js\";\nexport const y = () => x;\n";
  let host = MemoryHost::new(&[("/src/a.js", a), ("/src/b.js", b), ("/src/c.js", c)]);
  let cache = Cache::new();
  let services = host.services(&cache);

  let out = transform(&services, &host, &file("/src/a.js"), a).unwrap();
  assert!(out.artifacts[0].css.contains("a: function; b: function;"), "{}", out.artifacts[0].css);
  assert_eq!(out.dependencies, vec![file("/src/b.js"), file("/src/c.js")]);
}

#[test]
fn star_reexports_are_exploded() {
  let colors = "export const red = \"#f00\";\nexport const blue = \"#00f\";\nexport default \"none\";\n";
  let index = "export * from \"./colors.js\";\nexport const spacing = 8;\n";
  let card = r#"import { css } from "@preval/css";
import { red, spacing } from "./index.js";
export const card = css`color: ${red}; margin: ${spacing}px;`;
"#;
  let host = MemoryHost::new(&[
    ("/src/colors.js", colors),
    ("/src/index.js", index),
    ("/src/card.js", card),
  ]);
  let cache = Cache::new();
  let services = host.services(&cache);

  let out = transform(&services, &host, &file("/src/card.js"), card).unwrap();
  assert_eq!(
    out.artifacts[0].css,
    format!(".{} {{ color: #f00; margin: 8px; }}", out.artifacts[0].class_name)
  );
  assert_eq!(out.dependencies, vec![file("/src/colors.js"), file("/src/index.js")]);

  let index = cache.code(&file("/src/index.js")).unwrap();
  assert!(index.code.contains("export { red } from \"./colors.js\""), "{}", index.code);
  assert!(!index.code.contains("blue"));
  assert!(!index.code.contains("default"));
  assert_eq!(
    cache.export_names(&file("/src/colors.js")).unwrap().as_slice(),
    ["red".to_string(), "blue".to_string(), "default".to_string()]
  );
}

#[test]
fn cyclic_star_reexports_terminate() {
  let a = "export * from \"./b.js\";\nexport const x = 1;\n";
  let b = "export * from \"./a.js\";\nexport const y = 2;\n";
  let host = MemoryHost::new(&[("/src/a.js", a), ("/src/b.js", b)]);
  let cache = Cache::new();
  let services = host.services(&cache);

  let report = evaluate(&services, &host, &file("/src/a.js"), ["x", "y"]).unwrap();
  assert_eq!(report.values["x"], Ok(json!(1)));
  assert_eq!(report.values["y"], Ok(json!(2)));
}
