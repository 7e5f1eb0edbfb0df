#![allow(dead_code)]

use preval_js::cache::Cache;
use preval_js::eval::Interpreter;
use preval_js::host::FileId;
use preval_js::host::HostError;
use preval_js::host::Loader;
use preval_js::host::Resolver;
use preval_js::options::Options;
use preval_js::services::Services;
use preval_js::tags::CssTags;
use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Files held in memory. Relative specifiers resolve against the importer's directory; bare ones to
/// `/node_modules/<name>.js`.
pub struct MemoryHost {
  files: RefCell<HashMap<FileId, Arc<str>>>,
  resolutions: Cell<usize>,
  interpreter: Interpreter,
  tags: CssTags,
  options: Options,
}

impl MemoryHost {
  pub fn new(files: &[(&str, &str)]) -> MemoryHost {
    MemoryHost::with_options(files, Options::default())
  }

  pub fn with_options(files: &[(&str, &str)], options: Options) -> MemoryHost {
    let host = MemoryHost {
      files: RefCell::new(HashMap::new()),
      resolutions: Cell::new(0),
      interpreter: Interpreter::new(),
      tags: CssTags::from_options(&options),
      options,
    };
    for (name, text) in files {
      host.insert(name, text);
    }
    host
  }

  pub fn insert(&self, name: &str, text: &str) {
    self
      .files
      .borrow_mut()
      .insert(FileId::new(name), Arc::from(text));
  }

  pub fn text(&self, name: &str) -> String {
    self.files.borrow()[&FileId::new(name)].to_string()
  }

  pub fn resolutions(&self) -> usize {
    self.resolutions.get()
  }

  pub fn services<'a>(&'a self, cache: &'a Cache) -> Services<'a> {
    Services::new(cache, self, &self.interpreter, &self.tags, &self.options).unwrap()
  }
}

impl Loader for MemoryHost {
  fn file_text(&self, file: &FileId) -> Result<Arc<str>, HostError> {
    self
      .files
      .borrow()
      .get(file)
      .cloned()
      .ok_or_else(|| HostError::new(format!("no such file {file}")))
  }
}

impl Resolver for MemoryHost {
  fn resolve(&self, specifier: &str, importer: &FileId, _stack: &[FileId]) -> Result<FileId, HostError> {
    self.resolutions.set(self.resolutions.get() + 1);
    let path = if specifier.starts_with('.') {
      let dir = Path::new(importer.as_str()).parent().unwrap_or(Path::new("/"));
      let joined = dir.join(specifier);
      let mut parts: Vec<&str> = Vec::new();
      for part in joined.iter().filter_map(|p| p.to_str()) {
        match part {
          "/" | "." => {}
          ".." => {
            parts.pop();
          }
          other => parts.push(other),
        }
      }
      format!("/{}", parts.join("/"))
    } else {
      format!("/node_modules/{specifier}.js")
    };
    let file = FileId::new(path);
    if self.files.borrow().contains_key(&file) {
      Ok(file)
    } else {
      Err(HostError::new(format!("module {specifier:?} not found")))
    }
  }
}

pub fn file(name: &str) -> FileId {
  FileId::new(name)
}
