//! Scoped memory retrieval and context assembly for AI agents.
//!
//! memex stores four kinds of entry (guidelines, knowledge, tools, and
//! experiences) in a global/org/project/session scope hierarchy, retrieves
//! them with strategy-routed queries, and packs the results into a bounded
//! prompt context.
//!
//! | Type | Holds | Default half-life |
//! |------|-------|-------------------|
//! | **Guideline** | Rules and conventions, with a 0-100 priority | 30 days |
//! | **Knowledge** | Facts, decisions, reference material | 14 days |
//! | **Tool** | Commands and scripts | 30 days |
//! | **Experience** | Lessons from past attempts | 7 days |
//!
//! # Architecture
//!
//! - **Storage**: SQLite with an append-only version history and an FTS5
//!   index (porter stemming) over the current version of every entry
//! - **Retrieval**: a query router that infers one of eight strategies,
//!   then scores candidates by relation, tag, scope, text, priority, and
//!   recency signals
//! - **Reranking**: optional semantic rerank with local all-MiniLM-L6-v2
//!   embeddings via ONNX Runtime
//! - **Context**: budget, staleness, priority, compression, and format stages
//! - **Transport**: MCP over stdio or Streamable HTTP
//!
//! # Modules
//!
//! - [`config`]: TOML configuration with environment overrides
//! - [`context`]: context budget manager and assembler
//! - [`db`]: SQLite initialization, schema, migrations, and health checks
//! - [`embedding`]: embedding providers and the bounded embedding cache
//! - [`error`]: the [`error::MemoryError`] taxonomy
//! - [`memory`]: data model, storage traits, matching, scoring, and the query router

pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod memory;
