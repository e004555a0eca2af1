//! Retrieval core: data model, collaborator traits, text matching and
//! indexing, scope resolution, scoring, reranking, and the query router.

pub mod query;
pub mod repository;
pub mod rerank;
pub mod scope;
pub mod scoring;
pub mod store;
pub mod text_index;
pub mod text_match;
pub mod types;
