mod common;

use common::file;
use common::MemoryHost;
use preval_js::cache::Cache;
use preval_js::transform;
use std::io;
use std::sync::Arc;
use std::sync::Mutex;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct SharedWriter {
  buffer: Arc<Mutex<Vec<u8>>>,
}

impl SharedWriter {
  fn contents(&self) -> String {
    String::from_utf8(self.buffer.lock().unwrap().clone()).unwrap()
  }
}

struct SharedWriterGuard<'a> {
  buffer: &'a Arc<Mutex<Vec<u8>>>,
}

impl<'a> io::Write for SharedWriterGuard<'a> {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.buffer.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl<'a> MakeWriter<'a> for SharedWriter {
  type Writer = SharedWriterGuard<'a>;

  fn make_writer(&'a self) -> Self::Writer {
    SharedWriterGuard {
      buffer: &self.buffer,
    }
  }
}

fn capture(writer: &SharedWriter) -> tracing::subscriber::DefaultGuard {
  let subscriber = tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_ansi(false)
    .with_writer(writer.clone())
    .finish();
  tracing::subscriber::set_default(subscriber)
}

#[test]
fn actions_run_in_spans() {
  let writer = SharedWriter::default();
  let _guard = capture(&writer);

  let source = "import \"./missing.js\";\nexport const a = 1;\n";
  let host = MemoryHost::new(&[("/src/a.js", source)]);
  let cache = Cache::new();
  let services = host.services(&cache);
  transform(&services, &host, &file("/src/a.js"), source).unwrap();

  drop(_guard);
  let output = writer.contents();
  assert!(output.contains("entrypoint created"), "{output}");
  assert!(output.contains("action{kind="), "{output}");
  assert!(output.contains("WARN"), "expected the dropped import to be reported: {output}");
}

#[test]
fn waiting_actions_move_to_the_superseding_entrypoint() {
  let writer = SharedWriter::default();
  let guard = capture(&writer);

  let a = r#"import { css } from "@preval/css";
import { x } from "./c.js";
import { b } from "./b.js";
export const k = css`a: ${x}; b: ${b};`;
"#;
  let b = "import { y } from \"./c.js\";\nexport const b = y + 1;\n";
  let c = "export const x = 1;\nexport const y = 10;\n";
  let host = MemoryHost::new(&[("/src/a.js", a), ("/src/b.js", b), ("/src/c.js", c)]);
  let cache = Cache::new();
  let services = host.services(&cache);
  let out = transform(&services, &host, &file("/src/a.js"), a).unwrap();
  assert!(out.artifacts[0].css.contains("a: 1; b: 11;"), "{}", out.artifacts[0].css);

  drop(guard);
  let output = writer.contents();
  assert!(output.contains("entrypoint superseded"), "{output}");
  let redirected = output
    .lines()
    .filter(|line| line.contains("redirecting action of superseded entrypoint"))
    .collect::<Vec<_>>();
  assert!(
    redirected.iter().any(|line| line.contains("processEntrypoint")),
    "{output}"
  );
  // Only the superseding instance reached the code cache.
  let module = cache.code(&file("/src/c.js")).unwrap();
  assert!(module.only.contains("x") && module.only.contains("y"));
  assert_eq!(cache.entrypoint(&file("/src/c.js")).unwrap().generation, 1);
}
