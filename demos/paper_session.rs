//! Example: Driving a retrieval session through the tool plugins
//!
//! Demonstrates the flow a tool host goes through:
//! 1. Create a session
//! 2. Add one or more local PDFs to it
//! 3. Ask a question and print the best passages
//! 4. Delete the session
//!
//! Usage: cargo run --example paper_session -- "question" ID=PATH [ID=PATH...]

use anyhow::Context;
use scholar::prelude::*;
use serde_json::json;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let question = args
        .next()
        .context("usage: paper_session \"question\" ID=PATH [ID=PATH...]")?;
    let papers: Vec<(String, String)> = args
        .filter_map(|arg| {
            arg.split_once('=')
                .map(|(id, path)| (id.to_string(), path.to_string()))
        })
        .collect();

    let config = Config::load_or_default();
    let manager = Arc::new(RagManager::new(&config)?);

    let mut registry = PluginRegistry::new(Permission::READ_WRITE);
    register_rag_plugins(&mut registry, manager);

    println!("Tools: {}\n", registry.names().join(", "));

    let session = registry
        .execute("rag_create_session", json!({}))
        .await?
        .content;
    println!("Session: {}\n", session);

    for (paper_id, path) in &papers {
        let input = json!({"session_id": session, "paper_id": paper_id, "path": path});
        match registry.execute("rag_add_paper", input).await {
            Ok(output) => println!("{}", output),
            Err(e) => println!("Error adding {}: {}", paper_id, e),
        }
    }

    let info = registry
        .execute("rag_session_info", json!({"session_id": session}))
        .await?;
    println!("\nSession info:\n{}\n", info);

    println!("Question: {}\n", question);
    let results = registry
        .execute("rag_query", json!({"session_id": session, "query": question}))
        .await?;
    println!("{}", results);

    registry
        .execute("rag_delete_session", json!({"session_id": session}))
        .await?;

    Ok(())
}
