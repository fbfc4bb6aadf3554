//! rag-setup library
//!
//! Interactive registration of embedding and language models on OpenSearch
//! ML Commons, for managed domains and self-hosted clusters.

pub mod cli;
pub mod config;
pub mod messaging;
pub mod ml;
pub mod prompt;
pub mod registration;
pub mod runner;
