//! Blockseek CLI
//!
//! Command-line front end for the query compiler:
//! - `compile`: request JSON → Datalog query text (or the full result as JSON)
//! - `classify`: report the tier of each group set without compiling
//! - `inject`: add block/page scope to existing query text
//! - `schema` / `operators`: reference output for tool authors
//!
//! Requests are read from a file argument, or from stdin when it is omitted
//! or `-`.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

use blockseek_query::{
    classify_request, compile_request_v1, inject_text, query_request_v1_json_schema,
    CompilerConfig, Diagnostics, HierarchyOperator, QueryRequestV1, Severity, Tier,
};

#[derive(Parser)]
#[command(name = "blockseek")]
#[command(author, version, about = "Compile structured boolean queries into outliner Datalog")]
struct Cli {
    /// Compiler config (JSON). Missing fields keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a request into query text.
    Compile {
        /// Request JSON file (`-` or omitted: stdin)
        input: Option<PathBuf>,
        /// Print the full compiled result (text, columns, tier, diagnostics) as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the tier of each group set in a request.
    Classify {
        /// Request JSON file (`-` or omitted: stdin)
        input: Option<PathBuf>,
    },

    /// Add scope constraints to existing query text (best effort).
    Inject {
        /// Query text file (`-` or omitted: stdin)
        input: Option<PathBuf>,
        /// Allowed block uuid (repeatable)
        #[arg(long = "block-id")]
        block_ids: Vec<String>,
        /// Allowed page uuid (repeatable)
        #[arg(long = "page-id")]
        page_ids: Vec<String>,
    },

    /// Print the request JSON schema.
    Schema,

    /// List hierarchy operators with their strength and inverse.
    Operators,
}

fn init_logging(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .map_err(|e| anyhow!("invalid log filter: {e}"))?;
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("logging already initialized: {e}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = match &cli.config {
        Some(path) => CompilerConfig::from_json_file(path)?,
        None => CompilerConfig::default(),
    };

    match cli.command {
        Commands::Compile { input, json } => cmd_compile(input.as_deref(), json, &config),
        Commands::Classify { input } => cmd_classify(input.as_deref(), &config),
        Commands::Inject {
            input,
            block_ids,
            page_ids,
        } => cmd_inject(input.as_deref(), &block_ids, &page_ids),
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&query_request_v1_json_schema())?);
            Ok(())
        }
        Commands::Operators => {
            cmd_operators();
            Ok(())
        }
    }
}

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}

fn read_request(input: Option<&Path>) -> Result<QueryRequestV1> {
    let text = read_input(input)?;
    Ok(QueryRequestV1::from_json_str(&text)?)
}

fn print_diagnostics(diagnostics: &Diagnostics) {
    for d in diagnostics.iter() {
        let label = match d.severity {
            Severity::Warning => "warning".yellow().bold(),
            Severity::Info => "note".cyan().bold(),
        };
        eprintln!("{label}[{}]: {}", d.code.as_str(), d.message);
    }
}

fn tier_label(tier: Tier) -> colored::ColoredString {
    let text = tier.to_string();
    if tier.is_supported() {
        text.green()
    } else {
        text.red().bold()
    }
}

fn cmd_compile(input: Option<&Path>, json: bool, config: &CompilerConfig) -> Result<()> {
    let request = read_request(input)?;
    let compiled = match compile_request_v1(&request, config) {
        Ok(compiled) => compiled,
        Err(e) => {
            eprintln!("{} [{}] {e}", "error".red().bold(), e.code());
            return Err(e.into());
        }
    };
    tracing::info!(tier = %compiled.tier, rewrites = compiled.rewrites, "compiled request");

    if json {
        println!("{}", serde_json::to_string_pretty(&compiled)?);
    } else {
        print_diagnostics(&compiled.diagnostics);
        eprintln!(
            "{} {} ({} rewrite(s), columns: {})",
            "compiled".green().bold(),
            tier_label(compiled.tier),
            compiled.rewrites,
            compiled.columns.join(", ")
        );
        println!("{}", compiled.text);
    }
    Ok(())
}

fn cmd_classify(input: Option<&Path>, config: &CompilerConfig) -> Result<()> {
    let (request, diagnostics) = read_request(input)?.validate(config)?;
    print_diagnostics(&diagnostics);
    for (side, tier) in classify_request(&request) {
        println!("{:<6} {}", side.as_str().bold(), tier_label(tier));
    }
    Ok(())
}

fn cmd_inject(input: Option<&Path>, block_ids: &[String], page_ids: &[String]) -> Result<()> {
    let text = read_input(input)?;
    let (out, diagnostic) = inject_text(text.trim_end(), block_ids, page_ids);
    if let Some(d) = diagnostic {
        eprintln!("{} {}", "warning".yellow().bold(), d.message);
    }
    println!("{out}");
    Ok(())
}

fn cmd_operators() {
    println!(
        "{:<20} {:<14} {}",
        "operator".bold(),
        "strength".bold(),
        "inverse".bold()
    );
    for op in HierarchyOperator::ALL {
        println!(
            "{:<20} {:<14} {}",
            op.as_str(),
            format!("{:?}", op.strength()).to_lowercase(),
            op.inverse()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn inject_accepts_repeated_ids() {
        let cli = Cli::parse_from([
            "blockseek",
            "inject",
            "q.edn",
            "--block-id",
            "a",
            "--block-id",
            "b",
            "--page-id",
            "p",
        ]);
        match cli.command {
            Commands::Inject {
                block_ids,
                page_ids,
                ..
            } => {
                assert_eq!(block_ids, vec!["a", "b"]);
                assert_eq!(page_ids, vec!["p"]);
            }
            _ => panic!("expected inject"),
        }
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::parse_from(["blockseek", "compile", "--json", "--verbose", "--config", "c.json"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("c.json")));
    }
}
