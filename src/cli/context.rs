use anyhow::Result;
use clap::Args;

use crate::config::MemexConfig;
use crate::context::assemble::{AssembleRequest, Purpose};
use crate::context::format::OutputFormat;
use crate::memory::types::{ScopeDescriptor, ScopeType};

#[derive(Debug, Args)]
pub struct ContextArgs {
    /// Scope level to assemble for
    #[arg(long, default_value = "global")]
    pub scope: ScopeType,
    /// Scope id for non-global scopes
    #[arg(long)]
    pub scope_id: Option<String>,
    /// session_start, tool_injection, or query
    #[arg(long, default_value = "session_start")]
    pub purpose: Purpose,
    /// Task intent, e.g. lookup or debug
    #[arg(long)]
    pub intent: Option<String>,
    /// markdown, json, or natural_language
    #[arg(long)]
    pub format: Option<OutputFormat>,
    #[arg(long)]
    pub max_tokens: Option<usize>,
    /// Focus retrieval on this text
    #[arg(long)]
    pub search: Option<String>,
    /// Print budget and compression details to stderr
    #[arg(long)]
    pub stats: bool,
}

/// Assemble context and print it to stdout.
pub async fn context(config: &MemexConfig, args: ContextArgs) -> Result<()> {
    let state = crate::server::setup_shared_state(config)?;

    let scope = ScopeDescriptor {
        scope_type: args.scope,
        id: args.scope_id,
        inherit: true,
    };
    let mut request = AssembleRequest::new(scope, args.purpose);
    request.intent = args.intent;
    request.format = args.format;
    request.max_tokens = args.max_tokens;
    request.search = args.search;

    let assembler = state.assembler.clone();
    let response = tokio::task::spawn_blocking(move || assembler.assemble_context(&request)).await??;

    println!("{}", response.content);

    if args.stats {
        eprintln!();
        eprintln!(
            "budget: {} total, {} effective ({:?})",
            response.budget_info.total_budget,
            response.budget_info.effective_budget,
            response.budget_info.complexity
        );
        eprintln!(
            "entries: {} in, {} out, {} stale",
            response.stats.input_entry_count,
            response.stats.output_entry_count,
            response.stats.stale_entry_count
        );
        eprintln!(
            "tokens: {} original, {} final ({:?})",
            response.stats.original_tokens, response.stats.final_tokens, response.compression_level
        );
        for warning in &response.staleness_warnings {
            eprintln!(
                "stale: {} {} ({:?}, {} days)",
                warning.entry_type,
                warning.entry_id,
                warning.reason,
                warning.age_days.unwrap_or_default()
            );
        }
    }

    Ok(())
}
