#![deny(missing_docs)]

//! Core library for the eznlp toolkit.
//!
//! Every operation here is a thin delegation to an external collaborator: Tika
//! for document extraction, Ollama for summaries, an NLI endpoint for zero-shot
//! classification, tantivy for the on-disk search index, and an ONNX token
//! classifier — run in a disposable worker process — for named entities.

/// Zero-shot classification client and sentiment/subject helpers.
pub mod classify;
/// Environment-driven configuration management.
pub mod config;
/// Document and URL text extraction client.
pub mod extract;
/// Structured logging and tracing setup.
pub mod logging;
/// Named-entity recognition behind the isolated worker process.
pub mod ner;
/// Semantic search index over plain-text corpora.
pub mod search;
/// Abstractive summarization client.
pub mod summarize;
