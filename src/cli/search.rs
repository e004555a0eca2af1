use anyhow::Result;
use clap::Args;

use crate::config::MemexConfig;
use crate::memory::query::QueryRequest;
use crate::memory::text_match::truncate_chars;
use crate::memory::types::{EntryType, ScopeDescriptor, ScopeType};

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Text to search for
    pub query: String,
    /// Restrict to one entry type (guideline, knowledge, tool, experience)
    #[arg(long = "type")]
    pub entry_type: Option<EntryType>,
    /// Scope level to search from, e.g. `project`
    #[arg(long)]
    pub scope: Option<ScopeType>,
    /// Scope id for non-global scopes
    #[arg(long)]
    pub scope_id: Option<String>,
    /// Rerank hits by embedding similarity
    #[arg(long)]
    pub semantic: bool,
    /// Tolerate typos
    #[arg(long)]
    pub fuzzy: bool,
    /// Treat the query as a regular expression
    #[arg(long)]
    pub regex: bool,
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

/// Run a query from the terminal and print ranked results.
pub async fn search(config: &MemexConfig, args: SearchArgs) -> Result<()> {
    let state = crate::server::setup_shared_state(config)?;

    let scope = args.scope.map(|scope_type| ScopeDescriptor {
        scope_type,
        id: args.scope_id.clone(),
        inherit: true,
    });
    let request = QueryRequest {
        types: args.entry_type.into_iter().collect(),
        scope,
        search: Some(args.query),
        fuzzy: args.fuzzy,
        regex: args.regex,
        semantic_search: args.semantic,
        limit: Some(args.limit),
        ..QueryRequest::default()
    };

    let router = state.router.clone();
    let response = tokio::task::spawn_blocking(move || router.execute_query(&request)).await??;

    if response.results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!(
        "Found {} result(s) via {} strategy\n",
        response.results.len(),
        response.strategy
    );
    if let Some(stats) = &response.rerank {
        if stats.applied {
            println!(
                "Reranked {} candidates with {} in {} ms\n",
                stats.candidates_processed,
                stats.embedding_model.as_deref().unwrap_or("?"),
                stats.processing_time_ms
            );
        }
    }

    for (i, item) in response.results.iter().enumerate() {
        let content = item.entry.content();
        let preview = if content.chars().count() > 120 {
            format!("{}...", truncate_chars(content, 120))
        } else {
            content.to_string()
        };

        println!(
            "  {}. [{}] {} ({}, score: {:.4})",
            i + 1,
            item.entry_type,
            item.entry.title(),
            item.id,
            item.score,
        );
        println!("     {}", preview);
        println!();
    }

    Ok(())
}
