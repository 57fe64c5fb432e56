//! scenecheck command line.
//!
//! - `scenecheck check <DOCUMENT>...`: validate scene documents and print a report
//! - `scenecheck test <DIR>`: treat every document in a directory as a test case

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use serde_json::json;

use scenecheck_kernel::{Engine, EngineConfig, IssueCollection, MemoryScene, RunTarget, SceneDocument};
use scenecheck_testutil::scenes::{DirectoryProvider, SceneTestRunner};

#[derive(Parser, Debug)]
#[command(name = "scenecheck")]
#[command(about = "Rule-driven validation for scene graphs and prefab hierarchies")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Engine config (default: ./scenecheck.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Disable colored output (also honors NO_COLOR)
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate scene documents
    Check {
        /// Scene documents (JSON)
        #[arg(required = true)]
        documents: Vec<PathBuf>,

        /// Validate this prefab in isolation instead of the open scenes
        #[arg(long)]
        prefab: Option<String>,
    },

    /// Validate every document in a directory; any error fails the run
    Test {
        /// Directory of scene documents
        dir: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text for terminals
    Human,
    /// JSON for machine consumption
    Json,
}

fn use_colors(args: &Args) -> bool {
    args.format == OutputFormat::Human && !args.no_color && std::env::var_os("NO_COLOR").is_none()
}

/// Run the CLI. Exit code 1 means validation found errors.
pub fn run(args: &Args) -> Result<ExitCode> {
    let config = EngineConfig::discover(args.config.as_deref())?.with_rich_text(false);
    tracing::debug!(?config, "configuration loaded");
    match &args.command {
        Command::Check { documents, prefab } => check(args, &config, documents, prefab.as_deref()),
        Command::Test { dir } => test(args, &config, dir),
    }
}

/// Load `path` and validate its open scenes, or `prefab` if given.
pub fn validate_document(
    config: &EngineConfig,
    path: &Path,
    prefab: Option<&str>,
) -> Result<(Arc<MemoryScene>, IssueCollection)> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let document = SceneDocument::from_json(&text).with_context(|| format!("loading {}", path.display()))?;
    let host = Arc::new(MemoryScene::from_document(&document).with_context(|| format!("loading {}", path.display()))?);
    if let Some(prefab) = prefab {
        if host.open_prefab_stage(prefab).is_none() {
            bail!("{}: no prefab at {prefab}", path.display());
        }
    }

    let target = RunTarget::current(host.as_ref());
    let engine = Engine::new(config.clone(), host.clone())?;
    let collection = engine
        .run_synchronously(target)
        .with_context(|| format!("validating {}", path.display()))?;
    Ok((host, collection))
}

fn check(args: &Args, config: &EngineConfig, documents: &[PathBuf], prefab: Option<&str>) -> Result<ExitCode> {
    let mut results = Vec::new();
    for path in documents {
        let (host, collection) = validate_document(config, path, prefab)?;
        results.push((path, host, collection));
    }
    let errors: usize = results.iter().map(|(_, _, c)| c.errors()).sum();
    let warnings: usize = results.iter().map(|(_, _, c)| c.warnings()).sum();

    match args.format {
        OutputFormat::Json => {
            let documents: Vec<_> = results
                .iter()
                .map(|(path, _, collection)| json!({ "path": path, "collection": collection }))
                .collect();
            let report = json!({ "documents": documents, "errors": errors, "warnings": warnings });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Human => {
            let color = use_colors(args);
            for (_, host, collection) in &results {
                print!("{}", render_human(collection, host.as_ref(), color));
            }
        }
    }

    Ok(if errors > 0 { ExitCode::from(1) } else { ExitCode::SUCCESS })
}

fn test(args: &Args, config: &EngineConfig, dir: &Path) -> Result<ExitCode> {
    let runner = SceneTestRunner::new(config.clone());
    let provider = DirectoryProvider::new(dir).excluding_label(config.exclude_label.clone());
    let summary = runner.run_all(&provider)?;
    match args.format {
        OutputFormat::Json => {
            let failures: Vec<_> = summary
                .failures
                .iter()
                .map(|f| json!({ "name": f.name, "result": format!("{:?}", f.result) }))
                .collect();
            let report = json!({
                "passed": summary.passed,
                "failed": summary.failed,
                "skipped": summary.skipped,
                "errors": summary.errors,
                "failures": failures,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Human => print!("{summary}"),
    }
    Ok(if summary.all_passed() { ExitCode::SUCCESS } else { ExitCode::from(1) })
}

/// The plain report, with severity tags colored when `color` is set.
pub fn render_human(collection: &IssueCollection, host: &MemoryScene, color: bool) -> String {
    let plain = collection.render_plain(host);
    if !color {
        return plain;
    }
    let mut out = String::with_capacity(plain.len());
    for (index, line) in plain.lines().enumerate() {
        if index == 0 {
            out.push_str(&line.bold().to_string());
        } else if let Some((indent, rest)) = split_tag(line, "[error]") {
            out.push_str(&format!("{indent}{}{rest}", "[error]".red().bold()));
        } else if let Some((indent, rest)) = split_tag(line, "[warning]") {
            out.push_str(&format!("{indent}{}{rest}", "[warning]".yellow().bold()));
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

fn split_tag<'a>(line: &'a str, tag: &str) -> Option<(&'a str, &'a str)> {
    let trimmed = line.trim_start();
    let indent = &line[..line.len() - trimmed.len()];
    trimmed.strip_prefix(tag).map(|rest| (indent, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_check_with_options() {
        let args = Args::try_parse_from([
            "scenecheck",
            "check",
            "a.json",
            "b.json",
            "--prefab",
            "Assets/Enemy.prefab",
            "--format",
            "json",
        ])
        .expect("valid arguments");
        assert_eq!(args.format, OutputFormat::Json);
        let Command::Check { documents, prefab } = args.command else {
            panic!("expected check");
        };
        assert_eq!(documents.len(), 2);
        assert_eq!(prefab.as_deref(), Some("Assets/Enemy.prefab"));
    }

    #[test]
    fn check_requires_documents() {
        assert!(Args::try_parse_from(["scenecheck", "check"]).is_err());
    }

    #[test]
    fn color_only_tags() {
        let host = MemoryScene::new();
        let collection = IssueCollection::empty("Scene(s) A.unity");
        let colored = render_human(&collection, &host, true);
        assert!(colored.contains("No issues found."));
        assert_eq!(render_human(&collection, &host, false), "Scene(s) A.unity\nNo issues found.\n");
    }

    #[test]
    fn split_tag_keeps_indent() {
        assert_eq!(split_tag("    [error] x", "[error]"), Some(("    ", " x")));
        assert_eq!(split_tag("[warning] y", "[error]"), None);
    }
}
