use std::{
  env, fs,
  path::{Component, Path, PathBuf},
  process,
};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use nanocc::{CodegenOptions, CompileError};
use tracing::{Level, info};

#[derive(Parser, Debug)]
#[command(name = "nanocc")]
#[command(about = "A tiny compiler from a C subset to x86-64 assembly")]
struct Cli {
  /// Log more (-v debug, -vv trace).
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Compile a source file to assembly.
  Build {
    /// Input source file.
    src: PathBuf,
    /// Output assembly file. Defaults to the source name with a `.s`
    /// extension in the current directory.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Leave out the trailing comment on each instruction.
    #[arg(long)]
    no_comments: bool,
  },
  /// Print the syntax tree of a source file as JSON.
  PrintAst {
    /// Input source file.
    src: PathBuf,
  },
}

fn main() {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  if let Err(err) = run(cli.command) {
    eprintln!("error: {err:#}");
    process::exit(1);
  }
}

fn init_tracing(verbose: u8) {
  let level = match verbose {
    0 => Level::WARN,
    1 => Level::DEBUG,
    _ => Level::TRACE,
  };
  tracing_subscriber::fmt()
    .with_max_level(level)
    .with_writer(std::io::stderr)
    .init();
}

fn run(command: Command) -> anyhow::Result<()> {
  match command {
    Command::Build {
      src,
      output,
      no_comments,
    } => {
      let src = resolve_path(&src)?;
      let output = match output {
        Some(output) => resolve_path(&output)?,
        None => resolve_path(&default_output(&src)?)?,
      };
      let source = read_source(&src)?;
      let options = CodegenOptions {
        comments: !no_comments,
      };
      let asm = nanocc::compile(source.as_slice(), &options)
        .map_err(|err| with_diagnostic(err, &src, &source))?;
      fs::write(&output, asm).with_context(|| format!("failed to write {}", output.display()))?;
      info!(src = %src.display(), output = %output.display(), "compiled");
    }
    Command::PrintAst { src } => {
      let src = resolve_path(&src)?;
      let source = read_source(&src)?;
      let program = nanocc::parse_source(source.as_slice())
        .map_err(|err| with_diagnostic(err, &src, &source))?;
      println!("{}", nanocc::dump_ast(&program)?);
    }
  }
  Ok(())
}

fn read_source(path: &Path) -> anyhow::Result<Vec<u8>> {
  fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn with_diagnostic(err: CompileError, path: &Path, source: &[u8]) -> anyhow::Error {
  anyhow!("{}: {}", path.display(), err.diagnostic(source))
}

/// `<stem>.s` for `src`, relative to the current directory.
fn default_output(src: &Path) -> anyhow::Result<PathBuf> {
  let name = src
    .file_name()
    .with_context(|| format!("{} has no file name", src.display()))?;
  Ok(Path::new(name).with_extension("s"))
}

/// Absolute, lexically normalised form of `path`; relative paths are taken
/// from the current working directory.
fn resolve_path(path: &Path) -> anyhow::Result<PathBuf> {
  let joined = if path.is_absolute() {
    path.to_path_buf()
  } else {
    env::current_dir()
      .context("failed to read the current directory")?
      .join(path)
  };

  let mut resolved = PathBuf::new();
  for component in joined.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        resolved.pop();
      }
      other => resolved.push(other.as_os_str()),
    }
  }
  Ok(resolved)
}
