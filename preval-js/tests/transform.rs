mod common;

use common::file;
use common::MemoryHost;
use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use preval_js::cache::Cache;
use preval_js::error::PipelineError;
use preval_js::evaluate;
use preval_js::host::AsyncResolver;
use preval_js::host::FileId;
use preval_js::host::HostError;
use preval_js::host::Resolver;
use preval_js::options::Options;
use preval_js::transform;
use preval_js::transform_async;
use serde_json::json;
use std::cell::Cell;

const THEME: &str = r#"export const color = "red";
export const size = 4;
export const unused = missing();
"#;

const BUTTON: &str = r#"import { css } from "@preval/css";
import { color, size } from "./theme.js";

export const button = css`
  color: ${color};
  padding: ${size * 2}px;
`;
"#;

fn button_host(options: Options) -> MemoryHost {
  MemoryHost::with_options(&[("/src/theme.js", THEME), ("/src/button.js", BUTTON)], options)
}

#[test]
fn extracts_tagged_templates() {
  let host = button_host(Options::default());
  let cache = Cache::new();
  let services = host.services(&cache);

  let out = transform(&services, &host, &file("/src/button.js"), BUTTON).unwrap();
  assert_eq!(out.artifacts.len(), 1);
  let artifact = &out.artifacts[0];
  assert_eq!(artifact.display_name, "button");
  assert!(artifact.class_name.starts_with("button_"));
  assert_eq!(
    artifact.css,
    format!(".{} {{ color: red;\n  padding: 8px; }}", artifact.class_name)
  );
  assert_eq!(
    out.code,
    format!(
      "import {{ color, size }} from \"./theme.js\";\n\nexport const button = \"{}\";\n",
      artifact.class_name
    )
  );
  assert_eq!(out.dependencies, vec![file("/src/theme.js")]);

  // `unused` was shaken away, so `missing()` never ran.
  let theme = cache.code(&file("/src/theme.js")).unwrap();
  assert!(!theme.code.contains("missing"));
}

#[test]
fn files_without_tags_pass_through() {
  let source = "import { color } from \"./theme.js\";\nexport const c = color;\n";
  let host = MemoryHost::new(&[("/src/theme.js", THEME), ("/src/plain.js", source)]);
  let cache = Cache::new();
  let services = host.services(&cache);

  let out = transform(&services, &host, &file("/src/plain.js"), source).unwrap();
  assert_eq!(out.code, source);
  assert!(out.artifacts.is_empty());
}

#[test]
fn class_prefix_applies() {
  let host = button_host(Options::default().with_class_prefix("x-"));
  let cache = Cache::new();
  let services = host.services(&cache);
  let out = transform(&services, &host, &file("/src/button.js"), BUTTON).unwrap();
  assert!(out.artifacts[0].class_name.starts_with("x-button_"));
}

#[test]
fn evaluation_errors_name_the_file() {
  let source = "import { css } from \"@preval/css\";\nexport const a = css`width: ${boom()}px;`;\n";
  let host = MemoryHost::new(&[("/src/a.js", source)]);
  let cache = Cache::new();
  let services = host.services(&cache);

  let err = transform(&services, &host, &file("/src/a.js"), source).unwrap_err();
  let PipelineError::Eval(err) = err else {
    panic!("expected an evaluation error, got {err:?}");
  };
  assert_eq!(err.chain.first(), Some(&file("/src/a.js")));
  assert!(err.message.contains("boom"), "{}", err.message);
}

#[test]
fn soft_errors_fall_back_to_the_source() {
  let source = "import { css } from \"@preval/css\";\nexport const a = css`width: ${boom()}px;`;\n";
  let host = MemoryHost::with_options(
    &[("/src/a.js", source)],
    Options::default().with_soft_errors(true),
  );
  let cache = Cache::new();
  let services = host.services(&cache);

  let out = transform(&services, &host, &file("/src/a.js"), source).unwrap();
  assert_eq!(out.code, source);
  assert!(out.artifacts.is_empty());
}

#[test]
fn syntax_errors_are_parse_errors() {
  let source = "export const a = (;\n";
  let host = MemoryHost::new(&[("/src/a.js", source)]);
  let cache = Cache::new();
  let services = host.services(&cache);

  let err = transform(&services, &host, &file("/src/a.js"), source).unwrap_err();
  assert!(
    matches!(&err, PipelineError::Parse { file: f, .. } if *f == file("/src/a.js")),
    "{err:?}"
  );
}

#[test]
fn unresolved_imports_fail_only_when_names_are_needed() {
  let needed = "import { css } from \"@preval/css\";\nimport { x } from \"./missing.js\";\nexport const a = css`width: ${x}px;`;\n";
  let side_effect = "import { css } from \"@preval/css\";\nimport \"./polyfill.js\";\nexport const a = css`width: 1px;`;\n";
  let host = MemoryHost::new(&[("/src/needed.js", needed), ("/src/side.js", side_effect)]);
  let cache = Cache::new();
  let services = host.services(&cache);

  let err = transform(&services, &host, &file("/src/needed.js"), needed).unwrap_err();
  assert!(
    matches!(&err, PipelineError::Resolve { specifier, .. } if specifier == "./missing.js"),
    "{err:?}"
  );

  let out = transform(&services, &host, &file("/src/side.js"), side_effect).unwrap();
  assert_eq!(out.artifacts.len(), 1);
  assert!(out.code.contains("import \"./polyfill.js\";"));
}

#[test]
fn tag_imports_used_elsewhere_are_kept() {
  let source = r#"import { css } from "@preval/css";
export const a = css`color: red;`;
export const later = () => css`color: blue;`;
"#;
  let host = MemoryHost::new(&[
    ("/src/a.js", source),
    ("/node_modules/@preval/css.js", "export const css = () => \"\";\n"),
  ]);
  let cache = Cache::new();
  let services = host.services(&cache);

  let out = transform(&services, &host, &file("/src/a.js"), source).unwrap();
  assert_eq!(out.artifacts.len(), 1);
  assert!(out.code.starts_with("import { css } from \"@preval/css\";"));
  assert!(out.code.contains("() => css`color: blue;`"));
}

#[test]
fn ignored_files_are_evaluated_whole() {
  let vendor = "export const color = \"teal\";\nexport const other = 1;\n";
  let source = "import { css } from \"@preval/css\";\nimport { color } from \"../vendor/lib.js\";\nexport const a = css`color: ${color};`;\n";
  let host = MemoryHost::with_options(
    &[("/vendor/lib.js", vendor), ("/src/a.js", source)],
    Options::default().with_ignore(["/vendor/"]),
  );
  let cache = Cache::new();
  let services = host.services(&cache);

  let out = transform(&services, &host, &file("/src/a.js"), source).unwrap();
  assert!(out.artifacts[0].css.contains("color: teal;"));
  let lib = cache.code(&file("/vendor/lib.js")).unwrap();
  assert_eq!(lib.code, vendor);
}

#[test]
fn commonjs_export_surfaces_are_evaluated() {
  let literal = "const color = \"red\";\nconst size = 4;\nconst unused = missing();\nmodule.exports = { color, size };\n";
  let members = "module.exports.color = \"teal\";\nexports.size = 2;\n";
  let nested = "const c = \"navy\";\nif (true) {\n  exports.color = c;\n}\n";
  let card = "import { css } from \"@preval/css\";\nimport { color } from \"./literal.js\";\nexport const card = css`color: ${color};`;\n";
  let host = MemoryHost::new(&[
    ("/src/literal.js", literal),
    ("/src/members.js", members),
    ("/src/nested.js", nested),
    ("/src/card.js", card),
  ]);
  let cache = Cache::new();
  let services = host.services(&cache);

  for (path, color) in [
    ("/src/literal.js", "red"),
    ("/src/members.js", "teal"),
    ("/src/nested.js", "navy"),
  ] {
    let report = evaluate(&services, &host, &file(path), ["color"]).unwrap();
    assert_eq!(report.values["color"], Ok(json!(color)), "{path}");
  }

  let report = evaluate(&services, &host, &file("/src/members.js"), ["*"]).unwrap();
  assert_eq!(report.values["color"], Ok(json!("teal")));
  assert_eq!(report.values["size"], Ok(json!(2)));

  let out = transform(&services, &host, &file("/src/card.js"), card).unwrap();
  assert!(out.artifacts[0].css.contains("color: red;"), "{}", out.artifacts[0].css);
  let shaken = cache.code(&file("/src/literal.js")).unwrap();
  assert!(shaken.code.contains("module.exports = { color, size };"));
  assert!(!shaken.code.contains("missing"));
}

// Resolves on a later poll, so other work can interleave with pending resolutions.
struct DeferredResolver<'a> {
  host: &'a MemoryHost,
  polls: Cell<usize>,
}

impl AsyncResolver for DeferredResolver<'_> {
  fn resolve_async(
    &self,
    specifier: String,
    importer: FileId,
    stack: Vec<FileId>,
  ) -> LocalBoxFuture<'_, Result<FileId, HostError>> {
    async move {
      tokio::task::yield_now().await;
      self.polls.set(self.polls.get() + 1);
      self.host.resolve(&specifier, &importer, &stack)
    }
    .boxed_local()
  }
}

#[tokio::test(flavor = "current_thread")]
async fn async_and_blocking_runs_agree() {
  let host = button_host(Options::default());

  let blocking_cache = Cache::new();
  let services = host.services(&blocking_cache);
  let blocking = transform(&services, &host, &file("/src/button.js"), BUTTON).unwrap();

  let async_cache = Cache::new();
  let services = host.services(&async_cache);
  let resolver = DeferredResolver {
    host: &host,
    polls: Cell::new(0),
  };
  let non_blocking = transform_async(&services, &resolver, &file("/src/button.js"), BUTTON)
    .await
    .unwrap();

  assert_eq!(blocking, non_blocking);
  assert!(resolver.polls.get() > 0);
}

#[tokio::test(flavor = "current_thread")]
async fn sync_resolvers_work_asynchronously() {
  let host = button_host(Options::default());
  let cache = Cache::new();
  let services = host.services(&cache);
  let out = transform_async(&services, &host, &file("/src/button.js"), BUTTON)
    .await
    .unwrap();
  assert_eq!(out.artifacts.len(), 1);
}
