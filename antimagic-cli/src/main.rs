//! antimagic CLI - replace magic string literals in Python sources with
//! generated constants.
//!
//! Features:
//! - `antimagic.toml` configuration, overridden by command-line flags
//! - Report-only mode for CI and pre-commit checks
//! - Optional post-write formatting hook
//! - Exit status 0 (clean), 1 (findings or files modified), 2 (fatal error)

use anyhow::{Context, Result};
use clap::Parser;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::Command;

use antimagic_core::{
    init_logging, load_config, load_config_file, print_json, print_plain, Antimagic,
    AntimagicConfig, DifficultPolicy, DuplicatePolicy, NamingAssistant, RunOutcome,
    FILEPATHS_PLACEHOLDER,
};

/// Exit status of a run with nothing to do.
const EXIT_CLEAN: i32 = 0;
/// Exit status when literals were reported or files were rewritten.
const EXIT_CHANGED: i32 = 1;
/// Exit status of a fatal error; every touched file has been restored.
const EXIT_FATAL: i32 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about = "Replace magic string literals in Python code with named constants")]
pub struct Cli {
    /// Python files or directories to scan (default: the whole root)
    paths: Vec<PathBuf>,

    /// Project root; paths and the output directory are resolved against it
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Configuration file (default: antimagic.toml in the root, if present)
    #[arg(long, value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Directory for the generated constants, relative to the root
    #[arg(long, value_name = "DIR")]
    output_dir: Option<String>,

    /// Only report magic strings; do not modify any file
    #[arg(long)]
    no_modify: bool,

    /// Also extract literals that only appear inside type annotations
    #[arg(long)]
    include_annotations: bool,

    /// Suffix appended to every generated constant name
    #[arg(long, value_name = "SUFFIX")]
    const_name_suffix: Option<String>,

    /// Path prefixes (relative to the root) to exclude from scanning
    #[arg(long, value_name = "PREFIX")]
    exclude: Vec<String>,

    /// How to settle name collisions: exception, ignore, most_common or ai
    #[arg(long, value_name = "POLICY")]
    duplicates_solver: Option<DuplicatePolicy>,

    /// How to handle strings no name can be derived for: exception, ignore or ai
    #[arg(long, value_name = "POLICY")]
    difficult_string_solver: Option<DifficultPolicy>,

    /// Model identifier for the naming assistant
    #[arg(long, value_name = "MODEL")]
    assistant_model: Option<String>,

    /// Number of strings sent to the naming assistant per request
    #[arg(long, value_name = "N")]
    assistant_batch_size: Option<usize>,

    /// Maximum assistant rounds while resolving duplicate names
    #[arg(long, value_name = "N")]
    max_resolution_rounds: Option<usize>,

    /// Only extract values fully matching this regex
    #[arg(long, value_name = "REGEX")]
    allowed_values: Option<String>,

    /// Command run on modified files; must contain {filepaths}
    #[arg(long, value_name = "TEMPLATE")]
    formatting: Option<String>,

    /// Exit with status 0 even when strings were found or files modified
    #[arg(long)]
    suppress_fail: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    log_json: bool,
}

/// Load the configuration file and apply command-line overrides.
fn build_config(cli: &Cli) -> Result<AntimagicConfig> {
    let mut config = match &cli.config_file {
        Some(path) => load_config_file(path)
            .with_context(|| format!("Failed to load config from: {}", path.display()))?,
        None => load_config(&cli.root)
            .with_context(|| format!("Failed to load config in: {}", cli.root.display()))?
            .unwrap_or_default(),
    };

    config.root = cli.root.clone();
    if !cli.paths.is_empty() {
        config.paths = cli.paths.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if cli.no_modify {
        config.modify = false;
    }
    if cli.include_annotations {
        config.include_annotations = true;
    }
    if let Some(suffix) = &cli.const_name_suffix {
        config.const_name_suffix = suffix.clone();
    }
    config.exclude.extend(cli.exclude.iter().cloned());
    if let Some(policy) = cli.duplicates_solver {
        config.duplicates_solver = policy;
    }
    if let Some(policy) = cli.difficult_string_solver {
        config.difficult_string_solver = policy;
    }
    if let Some(model) = &cli.assistant_model {
        config.assistant_model = model.clone();
    }
    if let Some(size) = cli.assistant_batch_size {
        config.assistant_batch_size = size;
    }
    if let Some(rounds) = cli.max_resolution_rounds {
        config.max_resolution_rounds = rounds;
    }
    if let Some(pattern) = &cli.allowed_values {
        config.allowed_values = Some(pattern.clone());
    }
    if let Some(template) = &cli.formatting {
        config.formatting = Some(template.clone());
    }
    if cli.suppress_fail {
        config.suppress_fail = true;
    }
    Ok(config)
}

#[cfg(feature = "assistant")]
fn assistant(config: &AntimagicConfig) -> Result<Box<dyn NamingAssistant>> {
    let chat = antimagic_core::ChatAssistant::from_config(config)
        .context("Failed to set up the naming assistant")?;
    Ok(Box::new(chat))
}

#[cfg(not(feature = "assistant"))]
fn assistant(_config: &AntimagicConfig) -> Result<Box<dyn NamingAssistant>> {
    Ok(Box::new(antimagic_core::DisabledAssistant))
}

/// Quote a path for `sh`.
fn shell_quote(path: &Path) -> String {
    let text = path.to_string_lossy();
    if !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-'))
    {
        return text.to_string();
    }
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Expand the formatting template for the modified files.
fn formatting_command(template: &str, files: &[PathBuf]) -> String {
    let quoted: Vec<String> = files.iter().map(|f| shell_quote(f)).collect();
    template.replace(FILEPATHS_PLACEHOLDER, &quoted.join(" "))
}

/// Run the formatting hook in the project root. A failing formatter is
/// reported but does not undo the run.
fn run_formatter(root: &Path, template: &str, files: &[PathBuf]) -> Result<()> {
    let command = formatting_command(template, files);
    tracing::info!(command = %command, "Running formatter");
    let status = Command::new("sh")
        .arg("-c")
        .arg(&command)
        .current_dir(root)
        .status()
        .with_context(|| format!("Failed to run formatter: {}", command))?;
    if !status.success() {
        tracing::warn!(status = %status, "Formatter exited with an error");
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<i32> {
    let config = build_config(cli)?;
    let suppress_fail = config.suppress_fail;
    let formatting = config.formatting.clone();
    let root = config.root.clone();

    let assistant = assistant(&config)?;
    let outcome = Antimagic::from_config(config)
        .with_assistant(assistant)
        .run()?;

    match &outcome {
        RunOutcome::Clean => {
            eprintln!("No magic strings found.");
        }
        RunOutcome::Findings(findings) => {
            if cli.json {
                print_json(findings);
            } else {
                print_plain(findings);
            }
        }
        RunOutcome::Modified { files } => {
            for file in files {
                println!("Modified {}", file.display());
            }
            if let Some(template) = &formatting {
                run_formatter(&root, template, files)?;
            }
        }
    }

    Ok(if !outcome.is_failure() || suppress_fail {
        EXIT_CLEAN
    } else {
        EXIT_CHANGED
    })
}

fn main() {
    // Global panic guard; unwinding still rolls back any open transaction.
    panic::set_hook(Box::new(|info| {
        eprintln!("[PANIC] antimagic internal error: {}", info);
        eprintln!("[PANIC] Changes were reverted; the process will exit with code 2.");
    }));

    let cli = Cli::parse();
    init_logging(cli.log_json);

    let code = match panic::catch_unwind(AssertUnwindSafe(|| run(&cli))) {
        Ok(Ok(code)) => code,
        Ok(Err(e)) => {
            eprintln!("ERROR: {:#}", e);
            EXIT_FATAL
        }
        Err(_) => EXIT_FATAL,
    };
    std::process::exit(code);
}
