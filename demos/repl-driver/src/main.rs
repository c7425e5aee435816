//! Reads code fragments from stdin and runs them through `run_python_repl`.
//!
//! Fragments are separated by lines containing only `---`. Every fragment
//! runs in the same session, so names defined early stay visible later.

use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Duration;

use agent_workbench::config::loader;
use agent_workbench::repl::{RUN_PYTHON_REPL, SessionManager, dispatch};
use agent_workbench::tools::{ToolCatalog, ToolRegistry};
use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::info;

#[derive(Parser)]
#[command(version = agent_workbench::VERSION, about)]
struct Args {
    /// Runtime configuration file (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Extra tool catalog (JSON object of module name to records).
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Environment manifest describing datasets and libraries.
    #[arg(long)]
    environment: Option<PathBuf>,

    /// Deadline for each fragment, in milliseconds.
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Print the registered tools and exit.
    #[arg(long)]
    list_tools: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = loader::load_or_default(args.config.as_deref())?;
    if let Some(ms) = args.deadline_ms {
        let session = config
            .session()
            .clone()
            .with_default_deadline(Some(Duration::from_millis(ms)));
        config = config.with_session(session);
    }
    agent_workbench::telemetry::init(config.logging())?;
    info!(version = agent_workbench::version(), "repl driver starting");

    let mut catalog = ToolCatalog::linked();
    if let Some(path) = &args.catalog {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        catalog.extend(
            ToolCatalog::from_json_str(&raw)
                .with_context(|| format!("failed to parse catalog {}", path.display()))?,
        );
    }
    let registry = ToolRegistry::new(catalog)?;

    if let Some(path) = &args.environment {
        let manifest = loader::load_environment(path)?;
        println!(
            "environment {}: {} datasets, {} libraries",
            manifest.version(),
            manifest.datasets().map_or(0, |d| d.len()),
            manifest.libraries().map_or(0, |l| l.len()),
        );
    }

    if args.list_tools {
        for spec in registry.list_tools() {
            println!("{}::{} - {}", spec.module(), spec.name(), spec.description());
        }
        return Ok(());
    }

    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("failed to read fragments from stdin")?;

    let manager = SessionManager::python(&config);
    let session = manager.create().await?;
    info!(session = %session.id().short(), "session ready");

    for (index, fragment) in split_fragments(&input).into_iter().enumerate() {
        let text = dispatch(
            &registry,
            &session,
            RUN_PYTHON_REPL,
            &json!({ "command": fragment }),
        )
        .await?;
        println!("[{}] {}", index + 1, text.trim_end());
    }

    manager.dispose_all().await;
    Ok(())
}

fn split_fragments(input: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();
    for line in input.lines() {
        if line.trim() == "---" {
            fragments.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    fragments.push(current);
    fragments.retain(|fragment| !fragment.trim().is_empty());
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_split_on_separator_lines() {
        let input = "x = 1\n---\nprint(x)\n  ---  \n\n---\n";
        assert_eq!(split_fragments(input), ["x = 1\n", "print(x)\n"]);
    }
}
