pub mod chunker;
pub mod context_builder;
pub mod models;
pub mod retriever;
