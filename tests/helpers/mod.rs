#![allow(dead_code)]

use std::sync::Arc;

use memex::config::{MemexConfig, QueryConfig};
use memex::context::assemble::ContextAssembler;
use memex::context::ContextBudgetManager;
use memex::db;
use memex::embedding::EmbeddingProvider;
use memex::memory::query::QueryRouter;
use memex::memory::repository::{RelationGraph, Repository, ScopeHierarchy};
use memex::memory::rerank::{RerankConfig, RerankStage};
use memex::memory::store::{self, SqliteStore};
use memex::memory::text_index::TextIndexBackend;
use memex::memory::types::{
    EntryPayload, ExperiencePayload, GuidelinePayload, KnowledgePayload, ScopeDescriptor,
    ToolPayload,
};
use rusqlite::Connection;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

pub fn test_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::new(test_db()))
}

pub fn router(store: &Arc<SqliteStore>) -> QueryRouter {
    router_with(store, &QueryConfig::default())
}

pub fn router_with(store: &Arc<SqliteStore>, config: &QueryConfig) -> QueryRouter {
    let repo: Arc<dyn Repository> = store.clone();
    let hierarchy: Arc<dyn ScopeHierarchy> = store.clone();
    let graph: Arc<dyn RelationGraph> = store.clone();
    let text: Arc<dyn TextIndexBackend> = store.clone();
    QueryRouter::new(repo, hierarchy, graph, text, config)
}

pub fn reranking_router(
    store: &Arc<SqliteStore>,
    provider: Arc<dyn EmbeddingProvider>,
) -> QueryRouter {
    router(store).with_rerank(RerankStage::new(RerankConfig::default(), provider))
}

pub fn assembler(store: &Arc<SqliteStore>, config: &MemexConfig) -> ContextAssembler {
    let router = Arc::new(router_with(store, &config.query));
    let manager = Arc::new(ContextBudgetManager::new(&config.context));
    ContextAssembler::new(router, manager)
}

/// Insert an entry through the store's write path. Returns the entry id.
pub fn insert(store: &SqliteStore, scope: &ScopeDescriptor, payload: EntryPayload) -> String {
    let mut conn = store.lock().unwrap();
    store::create_entry(&mut conn, scope, &payload).unwrap()
}

/// Insert with a fixed creation timestamp.
pub fn insert_at(
    store: &SqliteStore,
    scope: &ScopeDescriptor,
    payload: EntryPayload,
    created_at: &str,
) -> String {
    let mut conn = store.lock().unwrap();
    store::create_entry_at(&mut conn, scope, &payload, created_at).unwrap()
}

pub fn guideline(name: &str, content: &str, priority: i64) -> EntryPayload {
    EntryPayload::Guideline(GuidelinePayload {
        name: name.into(),
        category: None,
        priority,
        content: content.into(),
        rationale: None,
    })
}

pub fn knowledge(title: &str, content: &str) -> EntryPayload {
    EntryPayload::Knowledge(KnowledgePayload {
        title: title.into(),
        category: None,
        content: content.into(),
        source: None,
        confidence: 1.0,
    })
}

pub fn tool(name: &str, description: &str) -> EntryPayload {
    EntryPayload::Tool(ToolPayload {
        name: name.into(),
        category: None,
        description: description.into(),
    })
}

pub fn experience(title: &str, content: &str) -> EntryPayload {
    EntryPayload::Experience(ExperiencePayload {
        title: title.into(),
        category: None,
        content: content.into(),
        scenario: None,
        outcome: None,
        confidence: 1.0,
    })
}

/// Deterministic embedder: one dimension per keyword, plus a bias dimension
/// so no text maps to the zero vector.
pub struct KeywordEmbedder {
    pub keywords: Vec<&'static str>,
    pub available: bool,
}

impl KeywordEmbedder {
    pub fn new(keywords: Vec<&'static str>) -> Arc<dyn EmbeddingProvider> {
        Arc::new(Self {
            keywords,
            available: true,
        })
    }
}

impl EmbeddingProvider for KeywordEmbedder {
    fn is_available(&self) -> bool {
        self.available
    }

    fn model(&self) -> &str {
        "keyword-test"
    }

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = self
            .keywords
            .iter()
            .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
            .collect();
        v.push(0.1);
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        self.keywords.len() + 1
    }
}

/// Every-call-fails backend that still claims to be available.
pub struct BrokenEmbedder;

impl EmbeddingProvider for BrokenEmbedder {
    fn model(&self) -> &str {
        "broken"
    }

    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("backend offline")
    }

    fn embed_batch(&self, _texts: &[&str]) -> anyhow::Result<Vec<Option<Vec<f32>>>> {
        anyhow::bail!("backend offline")
    }
}
