use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use scholar_core::config::Config;
use scholar_core::detection::{check_ollama_silent, resolve_device, setup_hint};
use scholar_core::models::ModelRegistry;
use scholar_core::{AddPaperStatus, RagManager};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scholar")]
#[command(about = "Ask questions against a local collection of scientific papers", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Show engine logs on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Embedding model management commands")]
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },

    #[command(about = "Check that the embedding server and hardware are usable")]
    Doctor,

    #[command(about = "Load papers into a fresh session and ask one question")]
    Ask {
        /// Paper to ingest, as ID=PATH (repeatable)
        #[arg(short, long = "paper", value_name = "ID=PATH", required = true, value_parser = parse_paper)]
        papers: Vec<(String, PathBuf)>,

        /// Number of passages to return (defaults to rag.top_k)
        #[arg(short)]
        k: Option<usize>,

        question: String,
    },
}

#[derive(Subcommand)]
enum ModelCommands {
    #[command(about = "Show current embedding model")]
    Show,

    #[command(about = "Set the embedding model")]
    Set {
        #[arg(help = "Model name as known to Ollama (e.g., 'embeddinggemma' or 'nomic-embed-text:latest')")]
        model: String,

        /// Output dimension, required for models not in the registry
        #[arg(short, long)]
        dimension: Option<usize>,
    },

    #[command(about = "List known embedding models and which are installed in Ollama")]
    List {
        #[arg(short, long, default_value = "http://localhost:11434")]
        url: String,
    },
}

fn parse_paper(value: &str) -> std::result::Result<(String, PathBuf), String> {
    match value.split_once('=') {
        Some((id, path)) if !id.is_empty() && !path.is_empty() => {
            Ok((id.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected ID=PATH, got '{}'", value)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Show => show_config(&cli.config),
        Commands::Model { command } => match command {
            ModelCommands::Show => show_model(&cli.config),
            ModelCommands::Set { model, dimension } => set_model(&cli.config, &model, dimension),
            ModelCommands::List { url } => list_models(&url).await,
        },
        Commands::Doctor => doctor(&cli.config),
        Commands::Ask { papers, k, question } => ask(&cli.config, &papers, k, &question).await,
    }
}

/// Loads the config file, or defaults when it does not exist yet.
fn load_config(config_path: &Path) -> Result<Config> {
    if !config_path.exists() {
        return Ok(Config::default());
    }
    Config::load(config_path).context("Failed to load config")
}

fn show_config(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    let dimension = match config.embedding.resolve_dimension() {
        Ok(dimension) => dimension.to_string(),
        Err(_) => "unknown".red().to_string(),
    };

    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "Embedding:".bold());
    println!("  Model:          {}", config.embedding.model.cyan());
    println!("  Base URL:       {}", config.embedding.base_url);
    println!("  Dimension:      {}", dimension);
    println!("  Batch Size:     {}", config.embedding.batch_size);
    println!("  Truncate:       {}", config.embedding.truncate);
    println!();
    println!("{}", "RAG:".bold());
    println!("  Chunk Size:     {}", config.rag.chunk_size);
    println!("  Chunk Overlap:  {}", config.rag.chunk_overlap);
    println!("  Top K:          {}", config.rag.top_k);
    println!();
    println!("{}", "Index:".bold());
    println!("  Backend:        {:?}", config.index.backend);
    println!("  Device:         {:?}", config.device);

    Ok(())
}

fn show_model(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    println!("{}: {}", "Current embedding model".bold(), config.embedding.model.cyan());
    if let Some(model) = ModelRegistry::new().find(&config.embedding.model) {
        println!("  {} ({} dimensions, {} token context)", model.description, model.embedding_dim, model.context_length);
    }
    Ok(())
}

fn set_model(config_path: &Path, model: &str, dimension: Option<usize>) -> Result<()> {
    let mut config = load_config(config_path)?;

    config.embedding.model = model.to_string();
    config.embedding.dimension = dimension;
    let resolved = config
        .embedding
        .resolve_dimension()
        .context("Cannot use this model")?;

    config.save(config_path).context("Failed to write config file")?;

    println!(
        "{} Embedding model updated to: {} ({} dimensions)",
        "✓".green().bold(),
        model.cyan(),
        resolved
    );
    println!(
        "  {}",
        "Sessions built with the previous model are not comparable; recreate them.".yellow()
    );

    Ok(())
}

async fn list_models(base_url: &str) -> Result<()> {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct OllamaModel {
        name: String,
    }

    #[derive(Deserialize)]
    struct OllamaResponse {
        models: Vec<OllamaModel>,
    }

    async fn installed(base_url: &str) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", base_url.trim_end_matches('/'));
        let response = reqwest::get(&url)
            .await
            .context("Failed to connect to Ollama. Is it running?")?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama returned error: {}", response.status());
        }

        let data: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;
        Ok(data.models.into_iter().map(|m| m.name).collect())
    }

    println!("{} Fetching models from {}...", "→".blue(), base_url);
    let installed = match installed(base_url).await {
        Ok(names) => Some(names),
        Err(e) => {
            println!("{} {:#}", "!".yellow().bold(), e);
            None
        }
    };
    println!();

    println!("{}", "Known embedding models:".bold().green());
    println!();

    for model in ModelRegistry::new().all() {
        let marker = match &installed {
            Some(names) if names.iter().any(|name| name.split(':').next() == Some(model.id.as_str())) => {
                "installed".green().to_string()
            }
            Some(_) => format!("ollama pull {}", model.id).dimmed().to_string(),
            None => String::new(),
        };
        println!(
            "  {} {} ({} dims) {}",
            "•".cyan(),
            model.id.bold(),
            model.embedding_dim,
            marker
        );
    }

    println!();
    println!("Use {} to set a model", "scholar -c config.yaml model set <model>".bold());

    Ok(())
}

fn doctor(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let mut healthy = true;

    match check_ollama_silent() {
        Ok(_) => println!("{} Ollama is installed and running", "✓".green().bold()),
        Err(e) => {
            healthy = false;
            println!("{} {}", "✗".red().bold(), e);
            println!("  {}", setup_hint(&e));
        }
    }

    match config.embedding.resolve_dimension() {
        Ok(dimension) => println!(
            "{} Embedding model {} ({} dimensions)",
            "✓".green().bold(),
            config.embedding.model.cyan(),
            dimension
        ),
        Err(e) => {
            healthy = false;
            println!("{} {}", "✗".red().bold(), e);
        }
    }

    let device = resolve_device(config.device);
    println!("{} Device: {} (requested {:?})", "✓".green().bold(), device.to_string().cyan(), config.device);
    println!("  Index backend: {:?}", config.index.backend);

    if !healthy {
        anyhow::bail!("environment is not ready");
    }
    Ok(())
}

async fn ask(
    config_path: &Path,
    papers: &[(String, PathBuf)],
    k: Option<usize>,
    question: &str,
) -> Result<()> {
    let config = load_config(config_path)?;
    let manager = RagManager::new(&config).context("Failed to initialize retrieval engine")?;
    let session = manager.create_session().await;

    for (paper_id, path) in papers {
        let status = manager
            .add_paper(&session, paper_id, path)
            .await
            .with_context(|| format!("Failed to add {}", path.display()))?;

        let marker = match status {
            AddPaperStatus::Added { .. } => "✓".green().bold(),
            AddPaperStatus::AlreadyPresent { .. } => "•".yellow().bold(),
        };
        println!("{} {}", marker, status);
    }
    println!();

    let records = manager
        .query(&session, question, k)
        .await
        .context("Query failed")?;

    if records.is_empty() {
        println!("{}", "No matching passages.".yellow());
        return Ok(());
    }

    for (rank, record) in records.iter().enumerate() {
        let pages = record
            .chunk
            .page_numbers()
            .iter()
            .map(|page| page.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        println!(
            "{} {} {} {}",
            format!("{}.", rank + 1).bold(),
            record.chunk.paper_id().unwrap_or("?").cyan(),
            format!("p. {}", pages).dimmed(),
            format!("(score {:.4})", record.score).dimmed()
        );
        println!("   {}", record.text());
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paper() {
        assert_eq!(
            parse_paper("1706.03762=/tmp/attention.pdf").unwrap(),
            ("1706.03762".to_string(), PathBuf::from("/tmp/attention.pdf"))
        );
        assert_eq!(
            parse_paper("doi=10.1/x=y.pdf").unwrap(),
            ("doi".to_string(), PathBuf::from("10.1/x=y.pdf"))
        );
        assert!(parse_paper("no-separator").is_err());
        assert!(parse_paper("=path.pdf").is_err());
    }

    #[test]
    fn test_cli_parses_ask() {
        let cli = Cli::try_parse_from([
            "scholar", "ask", "--paper", "a=/tmp/a.pdf", "-p", "b=/tmp/b.pdf", "-k", "3", "what is attention?",
        ])
        .unwrap();

        match cli.command {
            Commands::Ask { papers, k, question } => {
                assert_eq!(papers.len(), 2);
                assert_eq!(k, Some(3));
                assert_eq!(question, "what is attention?");
            }
            _ => panic!("expected ask"),
        }
    }
}
