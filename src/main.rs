use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use env_logger::Env;
use log::{debug, info, warn};

use asset_packer::{BuildType, InlinePolicy, PackBuilder, PackOptions, write_output};

#[derive(Debug, Parser)]
#[command(author, version, about = "Bundle an HTML, JS or CSS entry file with everything it references", long_about = None)]
struct Cli {
  /// Entry file to pack
  entry: PathBuf,

  /// Write the packed result here instead of stdout
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Configuration file (defaults to pack.config.json next to the entry)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Inline policy: true, false, or a byte limit
  #[arg(long, value_parser = parse_inline)]
  inline: Option<InlinePolicy>,

  /// Wrapper format for packed scripts (global, module, nonmodule, amd, umd, cmd, commonjs)
  #[arg(long)]
  format: Option<BuildType>,

  /// Extra search directory, relative to the project root (repeatable)
  #[arg(long = "path")]
  paths: Vec<PathBuf>,

  /// Extension to try when a reference has none, e.g. `.js` (repeatable)
  #[arg(long = "ext")]
  extensions: Vec<String>,

  /// Increase log verbosity (-v info, -vv debug, -vvv trace)
  #[arg(short, long, action = ArgAction::Count)]
  verbose: u8,
}

fn parse_inline(value: &str) -> Result<InlinePolicy, String> {
  match value.trim().to_ascii_lowercase().as_str() {
    "true" => Ok(InlinePolicy::Always),
    "false" => Ok(InlinePolicy::Never),
    other => other
      .parse()
      .map(InlinePolicy::Below)
      .map_err(|_| format!("expected true, false or a byte limit, got '{value}'")),
  }
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let log_level = match cli.verbose {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };
  env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

  let mut options = match &cli.config {
    Some(path) => PackOptions::from_path(path)?,
    None => {
      let entry_dir = cli
        .entry
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), PathBuf::from);
      PackOptions::discover(&entry_dir)
    }
  };
  if let Some(inline) = cli.inline {
    options.inline = Some(inline);
  }
  if let Some(format) = cli.format {
    options.build_type = format;
  }
  options.paths.extend(cli.paths);
  options.extensions.extend(cli.extensions);
  debug!("options: {:?}", options);

  let mut builder = PackBuilder::new(options);
  let output = builder.build(&cli.entry)?;
  if !output.warnings.is_empty() {
    info!("{} warning(s) while packing {}", output.warnings.len(), output.name);
  }

  match &cli.output {
    Some(dest) => write_output(&cli.entry, &output, dest)?,
    None => {
      let mut stdout = std::io::stdout().lock();
      match &output.content {
        Some(content) => stdout.write_all(content.as_bytes())?,
        None => {
          let bytes = std::fs::read(&cli.entry)
            .with_context(|| format!("failed to read {}", cli.entry.display()))?;
          stdout.write_all(&bytes)?;
        }
      }
      stdout.flush()?;
      for file in &output.extracted {
        warn!("not writing {}: extracted files need --output", file.name);
      }
    }
  }

  Ok(())
}
