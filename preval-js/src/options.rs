use crate::error::PipelineError;
use crate::host::FileId;
use aho_corasick::AhoCorasick;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
  /// Files whose path contains any of these substrings pass through unmodified: they are evaluated
  /// whole and never shaken.
  pub ignore: Vec<String>,
  /// Fall back to the original source, with a warning, when processing a root file fails.
  pub soft_errors: bool,
  /// Module the `css` tag is imported from.
  pub tag_module: String,
  /// Prepended to every generated class name.
  pub class_prefix: String,
  pub keep_side_effect_imports: bool,
}

impl Default for Options {
  fn default() -> Self {
    Options {
      ignore: Vec::new(),
      soft_errors: false,
      tag_module: "@preval/css".to_string(),
      class_prefix: String::new(),
      keep_side_effect_imports: true,
    }
  }
}

impl Options {
  pub fn with_ignore(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
    self.ignore = patterns.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_soft_errors(mut self, soft_errors: bool) -> Self {
    self.soft_errors = soft_errors;
    self
  }

  pub fn with_tag_module(mut self, tag_module: impl Into<String>) -> Self {
    self.tag_module = tag_module.into();
    self
  }

  pub fn with_class_prefix(mut self, class_prefix: impl Into<String>) -> Self {
    self.class_prefix = class_prefix.into();
    self
  }

  pub fn with_keep_side_effect_imports(mut self, keep: bool) -> Self {
    self.keep_side_effect_imports = keep;
    self
  }
}

/// Compiled form of [`Options::ignore`].
#[derive(Clone, Debug)]
pub struct IgnoreRules {
  matcher: Option<AhoCorasick>,
}

impl IgnoreRules {
  pub fn new(patterns: &[String]) -> Result<IgnoreRules, PipelineError> {
    if patterns.is_empty() {
      return Ok(IgnoreRules { matcher: None });
    }
    let matcher = AhoCorasick::new(patterns).map_err(|e| PipelineError::Options(e.to_string()))?;
    Ok(IgnoreRules {
      matcher: Some(matcher),
    })
  }

  pub fn is_ignored(&self, file: &FileId) -> bool {
    self
      .matcher
      .as_ref()
      .is_some_and(|m| m.is_match(file.as_str()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn deserializes_camel_case_with_defaults() {
    let options: Options =
      serde_json::from_str(r#"{ "softErrors": true, "ignore": ["node_modules"] }"#).unwrap();
    assert!(options.soft_errors);
    assert!(options.keep_side_effect_imports);
    assert_eq!(options.tag_module, "@preval/css");
    assert_eq!(options.ignore, vec!["node_modules".to_string()]);
  }

  #[test]
  fn matches_ignored_paths() {
    let rules = IgnoreRules::new(&["/vendor/".to_string(), ".min.js".to_string()]).unwrap();
    assert!(rules.is_ignored(&FileId::new("/app/vendor/lib.js")));
    assert!(rules.is_ignored(&FileId::new("/app/a.min.js")));
    assert!(!rules.is_ignored(&FileId::new("/app/src/a.js")));
    assert!(!IgnoreRules::new(&[]).unwrap().is_ignored(&FileId::new("/a.js")));
  }
}
