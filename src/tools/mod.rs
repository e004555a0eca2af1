pub mod memory_context;
pub mod memory_query;

use memory_context::MemoryContextParams;
use memory_query::MemoryQueryParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};

use crate::server::SharedState;

/// The memex MCP tool handler. Holds the shared query router and context
/// assembler and exposes them via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct MemexTools {
    tool_router: ToolRouter<Self>,
    state: SharedState,
}

#[tool_router]
impl MemexTools {
    pub fn new(state: SharedState) -> Self {
        Self {
            tool_router: Self::tool_router(),
            state,
        }
    }

    /// Query stored entries.
    #[tool(description = "Query memory entries (guidelines, knowledge, tools, experiences). The strategy is inferred from the parameters: semanticSearch, relatedTo, tags, date bounds, priority, conversationId, search, in that order.")]
    async fn memory_query(
        &self,
        Parameters(params): Parameters<MemoryQueryParams>,
    ) -> Result<String, String> {
        let request = params.into_request()?;
        tracing::info!(
            search = request.search.as_deref().unwrap_or(""),
            types = request.types.len(),
            "memory_query called"
        );

        let router = self.state.router.clone();
        let response = tokio::task::spawn_blocking(move || router.execute_query(&request))
            .await
            .map_err(|e| format!("query task failed: {e}"))?
            .map_err(|e| format!("query failed: {e}"))?;

        serde_json::to_string(&response).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Assemble a bounded prompt context for a scope.
    #[tool(description = "Assemble relevant memory into a token-bounded context block for a scope. Returns the rendered content plus budget, compression, and staleness details.")]
    async fn memory_context(
        &self,
        Parameters(params): Parameters<MemoryContextParams>,
    ) -> Result<String, String> {
        let request = params.into_request()?;
        tracing::info!(purpose = ?request.purpose, "memory_context called");

        let assembler = self.state.assembler.clone();
        let store = self.state.store.clone();
        let response = tokio::task::spawn_blocking(move || {
            let response = assembler.assemble_context(&request)?;
            match store.lock() {
                Ok(mut conn) => {
                    if let Err(e) =
                        crate::memory::store::record_access(&mut conn, &response.included_ids)
                    {
                        tracing::warn!(error = %e, "failed to record access");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "failed to record access"),
            }
            Ok::<_, crate::error::MemoryError>(response)
        })
        .await
        .map_err(|e| format!("context task failed: {e}"))?
        .map_err(|e| format!("context assembly failed: {e}"))?;

        serde_json::to_string(&response).map_err(|e| format!("serialization failed: {e}"))
    }
}

#[tool_handler]
impl ServerHandler for MemexTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "memex holds scoped guidelines, knowledge, tools, and experiences. \
                 Use memory_context at the start of a task and memory_query to look \
                 things up."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
