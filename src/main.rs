use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use project_analyzer::error::Result;
use project_analyzer::llm::LlmRouter;
use project_analyzer::pipeline::{EventTap, PipelineEvent};
use project_analyzer::{logging, orchestrator, server, Config};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "project-analyzer", version, about = "Summarize a source-code archive")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a ZIP archive and print the report
    Analyze {
        /// Path to the ZIP archive
        archive: PathBuf,
        /// Model override, e.g. `ollama/llama3`
        #[arg(long)]
        model: Option<String>,
        /// Skip the LLM polish pass
        #[arg(long)]
        no_polish: bool,
        /// Emit the raw artifacts as JSON instead of a report
        #[arg(long)]
        json: bool,
    },
    /// Run the HTTP server
    Serve {
        /// Bind host override
        #[arg(long)]
        host: Option<String>,
        /// Bind port override
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    logging::init("info");
    if let Err(error) = run().await {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load()?;

    match cli.command {
        Commands::Analyze {
            archive,
            model,
            no_polish,
            json,
        } => {
            if let Some(model) = model {
                config.model = model;
            }
            if no_polish {
                config.polish = false;
            }
            analyze(config, archive, json).await
        }
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            server::serve(config).await
        }
    }
}

async fn analyze(config: Config, archive: PathBuf, json: bool) -> Result<()> {
    let llm = if config.polish {
        Some(Arc::new(LlmRouter::from_config(&config)?))
    } else {
        None
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    let tap: EventTap = {
        let spinner = spinner.clone();
        Box::new(move |event: &PipelineEvent| {
            spinner.set_message(event.kind().as_str());
        })
    };

    let outcome = orchestrator::run_analysis(&config, llm, archive, Some(tap)).await;
    spinner.finish_and_clear();

    let artifacts = outcome.map_err(|failure| failure.error)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&artifacts)?);
        return Ok(());
    }

    println!("{}", "Project structure".bold().underline());
    println!("{}", artifacts.tree_text);

    println!("{}", "File summaries".bold().underline());
    for record in &artifacts.file_summaries {
        println!(
            "  {} {} {}",
            record.rel_path.cyan(),
            format!("[{}]", record.kind).dimmed(),
            record.summary
        );
    }
    println!();

    println!("{}", "Overview".bold().underline());
    println!("{}", artifacts.project_summary);
    Ok(())
}
