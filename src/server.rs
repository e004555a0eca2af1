//! MCP server initialization for stdio and Streamable HTTP transports.
//!
//! [`setup_shared_state`] opens the database, loads the embedding provider,
//! and wires the query router and context assembler that every tool call
//! shares. The CLI reuses it for `search` and `context`.

use std::sync::Arc;

use anyhow::Result;
use rmcp::ServiceExt;

use crate::config::MemexConfig;
use crate::context::assemble::ContextAssembler;
use crate::context::ContextBudgetManager;
use crate::db;
use crate::embedding;
use crate::memory::query::QueryRouter;
use crate::memory::repository::{RelationGraph, Repository, ScopeHierarchy};
use crate::memory::rerank::RerankStage;
use crate::memory::store::SqliteStore;
use crate::memory::text_index::TextIndexBackend;
use crate::tools::MemexTools;

/// Everything a request needs, cheap to clone.
#[derive(Clone)]
pub struct SharedState {
    pub store: Arc<SqliteStore>,
    pub router: Arc<QueryRouter>,
    pub assembler: Arc<ContextAssembler>,
}

/// Open the DB, create the embedding provider, and build the pipeline.
pub fn setup_shared_state(config: &MemexConfig) -> Result<SharedState> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    match db::migrations::get_embedding_model(&conn)? {
        Some(stored_model) if stored_model != config.embedding.model => {
            tracing::warn!(
                stored = %stored_model,
                configured = %config.embedding.model,
                "embedding model differs from the one recorded in the database"
            );
        }
        Some(_) => {}
        None => db::migrations::set_embedding_model(&conn, &config.embedding.model)?,
    }

    let embedding = if config.rerank.enabled {
        embedding::create_provider_or_disabled(&config.embedding)
    } else {
        Arc::new(embedding::DisabledEmbeddingProvider::new("rerank disabled"))
    };
    tracing::info!(
        model = embedding.model(),
        available = embedding.is_available(),
        "embedding provider ready"
    );

    Ok(build_state(SqliteStore::new(conn), embedding, config))
}

/// Wire the router and assembler over an already-open store.
pub fn build_state(
    store: SqliteStore,
    embedding: Arc<dyn embedding::EmbeddingProvider>,
    config: &MemexConfig,
) -> SharedState {
    let store = Arc::new(store);
    let repo: Arc<dyn Repository> = store.clone();
    let hierarchy: Arc<dyn ScopeHierarchy> = store.clone();
    let graph: Arc<dyn RelationGraph> = store.clone();
    let text: Arc<dyn TextIndexBackend> = store.clone();

    let router = QueryRouter::new(repo, hierarchy, graph, text, &config.query)
        .with_rerank(RerankStage::new(config.rerank.clone(), embedding));
    let router = Arc::new(router);

    let manager = Arc::new(ContextBudgetManager::new(&config.context));
    let assembler = Arc::new(ContextAssembler::new(router.clone(), manager));

    SharedState {
        store,
        router,
        assembler,
    }
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: MemexConfig) -> Result<()> {
    tracing::info!("starting memex MCP server on stdio");

    let state = setup_shared_state(&config)?;

    let tools = MemexTools::new(state);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP transport.
pub async fn serve_sse(config: MemexConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    tracing::info!(addr = %bind_addr, "starting memex MCP server on HTTP");

    let state = setup_shared_state(&config)?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(MemexTools::new(state.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
