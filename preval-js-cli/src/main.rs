use clap::Args;
use clap::Parser;
use clap::Subcommand;
use preval_js::cache::Cache;
use preval_js::eval::Interpreter;
use preval_js::evaluate;
use preval_js::host::FileId;
use preval_js::host::HostError;
use preval_js::host::Loader;
use preval_js::host::Resolver;
use preval_js::options::Options;
use preval_js::services::Services;
use preval_js::tags::CssTags;
use preval_js::transform;
use serde::Serialize;
use std::fs;
use std::io::stdout;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use syntax_js::ast::NodeId;
use syntax_js::ast::NodeKind;
use syntax_js::loc::Loc;
use tracing::info;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "preval-js", version, about = "Evaluate tagged templates at build time")]
struct Cli {
  /// JSON file with options (`ignore`, `softErrors`, `tagModule`, `classPrefix`,
  /// `keepSideEffectImports`). Flags override it.
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Log pipeline activity to stderr. Filter with `RUST_LOG`.
  #[arg(long, global = true)]
  trace: bool,

  /// Log as JSON lines instead of text.
  #[arg(long, global = true)]
  trace_json: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Replace tagged templates with class names and extract their styles.
  Transform(TransformArgs),
  /// Print the values of exports of a module as JSON.
  Evaluate(EvaluateArgs),
  /// Print the syntax tree of a file as JSON.
  DumpAst(DumpAstArgs),
}

#[derive(Args)]
struct OptionArgs {
  /// Pass files whose path contains this text through unmodified. Repeatable.
  #[arg(long)]
  ignore: Vec<String>,

  /// Output the original source, with a warning, when processing fails.
  #[arg(long)]
  soft_errors: bool,

  /// Module the `css` tag is imported from.
  #[arg(long)]
  tag_module: Option<String>,

  /// Prefix for generated class names.
  #[arg(long)]
  class_prefix: Option<String>,
}

#[derive(Args)]
struct TransformArgs {
  file: PathBuf,

  /// Output destination for the code; omit for stdout.
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Write the extracted styles to this file.
  #[arg(long)]
  css: Option<PathBuf>,

  /// Print code, artifacts and dependencies as one JSON object.
  #[arg(long)]
  json: bool,

  #[command(flatten)]
  options: OptionArgs,
}

#[derive(Args)]
struct EvaluateArgs {
  file: PathBuf,

  /// Export to evaluate. Repeatable; omit for all exports.
  #[arg(long)]
  only: Vec<String>,

  #[command(flatten)]
  options: OptionArgs,
}

#[derive(Args)]
struct DumpAstArgs {
  file: PathBuf,
}

fn init_tracing(enabled: bool, json: bool) {
  if !enabled && !json {
    return;
  }
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE)
    .with_writer(std::io::stderr)
    .with_ansi(false);
  let _ = if json {
    builder.json().try_init()
  } else {
    builder.try_init()
  };
}

/// Reads files from disk and resolves specifiers the way bundlers do for plain ES modules.
struct FsHost;

const EXTENSIONS: [&str; 2] = ["js", "mjs"];

fn resolve_candidate(path: &Path) -> Option<PathBuf> {
  if path.is_file() {
    return Some(path.to_path_buf());
  }
  for ext in EXTENSIONS {
    let candidate = path.with_extension(ext);
    if candidate.is_file() {
      return Some(candidate);
    }
  }
  EXTENSIONS
    .iter()
    .map(|ext| path.join(format!("index.{ext}")))
    .find(|candidate| candidate.is_file())
}

fn file_id(path: &Path) -> Result<FileId, String> {
  let canonical = fs::canonicalize(path)
    .map_err(|err| format!("cannot read {}: {err}", path.display()))?;
  Ok(FileId::new(canonical.to_string_lossy().as_ref()))
}

impl Loader for FsHost {
  fn file_text(&self, file: &FileId) -> Result<Arc<str>, HostError> {
    fs::read_to_string(file.as_str())
      .map(Arc::from)
      .map_err(|err| HostError::new(format!("cannot read {file}: {err}")))
  }
}

impl Resolver for FsHost {
  fn resolve(&self, specifier: &str, importer: &FileId, _stack: &[FileId]) -> Result<FileId, HostError> {
    let dir = Path::new(importer.as_str())
      .parent()
      .unwrap_or(Path::new("/"));
    let found = if specifier.starts_with("./") || specifier.starts_with("../") {
      resolve_candidate(&dir.join(specifier))
    } else if specifier.starts_with('/') {
      resolve_candidate(Path::new(specifier))
    } else {
      dir
        .ancestors()
        .find_map(|ancestor| resolve_candidate(&ancestor.join("node_modules").join(specifier)))
    };
    let path = found.ok_or_else(|| HostError::new(format!("module {specifier:?} not found")))?;
    file_id(&path).map_err(HostError::new)
  }
}

fn load_options(config: Option<&Path>, args: &OptionArgs) -> Result<Options, String> {
  let mut options = match config {
    Some(path) => {
      let text = fs::read_to_string(path)
        .map_err(|err| format!("cannot read {}: {err}", path.display()))?;
      serde_json::from_str::<Options>(&text)
        .map_err(|err| format!("invalid config {}: {err}", path.display()))?
    }
    None => Options::default(),
  };
  options.ignore.extend(args.ignore.iter().cloned());
  if args.soft_errors {
    options.soft_errors = true;
  }
  if let Some(tag_module) = &args.tag_module {
    options.tag_module = tag_module.clone();
  }
  if let Some(class_prefix) = &args.class_prefix {
    options.class_prefix = class_prefix.clone();
  }
  Ok(options)
}

fn write_to(dest: Option<&Path>, text: &str) -> Result<(), String> {
  match dest {
    Some(path) => {
      fs::write(path, text).map_err(|err| format!("cannot write {}: {err}", path.display()))
    }
    None => stdout()
      .write_all(text.as_bytes())
      .map_err(|err| format!("cannot write to stdout: {err}")),
  }
}

fn run_transform(config: Option<&Path>, args: TransformArgs) -> Result<(), String> {
  let options = load_options(config, &args.options)?;
  let file = file_id(&args.file)?;
  let source = FsHost.file_text(&file).map_err(|err| err.to_string())?;
  let interpreter = Interpreter::new();
  let tags = CssTags::from_options(&options);
  let cache = Cache::new();
  let services = Services::new(&cache, &FsHost, &interpreter, &tags, &options)
    .map_err(|err| err.to_string())?;
  let out = transform(&services, &FsHost, &file, &source).map_err(|err| err.to_string())?;
  info!(%file, artifacts = out.artifacts.len(), dependencies = out.dependencies.len(), "transformed");

  if let Some(css) = &args.css {
    let styles: Vec<&str> = out.artifacts.iter().map(|a| a.css.as_str()).collect();
    write_to(Some(css), &format!("{}\n", styles.join("\n")))?;
  }
  if args.json {
    let json = serde_json::to_string_pretty(&out).map_err(|err| err.to_string())?;
    write_to(args.output.as_deref(), &json)
  } else {
    write_to(args.output.as_deref(), &out.code)
  }
}

fn run_evaluate(config: Option<&Path>, args: EvaluateArgs) -> Result<(), String> {
  let options = load_options(config, &args.options)?;
  let file = file_id(&args.file)?;
  let interpreter = Interpreter::new();
  let tags = CssTags::from_options(&options);
  let cache = Cache::new();
  let services = Services::new(&cache, &FsHost, &interpreter, &tags, &options)
    .map_err(|err| err.to_string())?;
  let only = if args.only.is_empty() {
    vec!["*".to_string()]
  } else {
    args.only
  };
  let report = evaluate(&services, &FsHost, &file, only).map_err(|err| err.to_string())?;
  info!(%file, values = report.values.len(), "evaluated");
  let json = serde_json::to_string_pretty(&report).map_err(|err| err.to_string())?;
  write_to(None, &format!("{json}\n"))
}

#[derive(Serialize)]
struct DumpedNode<'a> {
  id: NodeId,
  loc: Loc,
  kind: &'a NodeKind,
}

fn run_dump_ast(args: DumpAstArgs) -> Result<(), String> {
  let source = fs::read_to_string(&args.file)
    .map_err(|err| format!("cannot read {}: {err}", args.file.display()))?;
  let ast = syntax_js::parse(&source).map_err(|err| format!("{}: {err}", args.file.display()))?;
  let nodes: Vec<DumpedNode> = ast
    .reachable()
    .into_iter()
    .map(|id| DumpedNode {
      id,
      loc: ast.loc(id),
      kind: ast.kind(id),
    })
    .collect();
  let json = serde_json::to_string_pretty(&nodes).map_err(|err| err.to_string())?;
  write_to(None, &format!("{json}\n"))
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.trace, cli.trace_json);
  let config = cli.config.as_deref();
  let result = match cli.command {
    Commands::Transform(args) => run_transform(config, args),
    Commands::Evaluate(args) => run_evaluate(config, args),
    Commands::DumpAst(args) => run_dump_ast(args),
  };
  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(message) => {
      eprintln!("error: {message}");
      ExitCode::FAILURE
    }
  }
}
