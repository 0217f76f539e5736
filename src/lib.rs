//! Conversational memory for chat agents: bounded history, compaction, and
//! semantic recall around a language model.
//!
//! Every inbound message for a conversation identity runs through one
//! pipeline:
//!
//! | Step | Component | Notes |
//! |------|-----------|-------|
//! | 1 | [`memory::persona`] | identity profile → default profile → fallback |
//! | 2 | [`memory::history`] | last N turns, cut at the latest summary |
//! | 3 | [`memory::summarizer`] | window of N turns → one summary turn |
//! | 4 | [`memory::semantic`] | top-k facts for this identity only |
//! | 5 | [`memory::assembler`] | persona, history, live turn, in that order |
//!
//! The turn log is append-only: compaction writes a new `summary` turn and
//! never deletes the turns it replaces.
//!
//! # Architecture
//!
//! - **Storage**: SQLite for the turn log and tone profiles; vectors in the same
//!   database, ranked with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   distance functions
//! - **Models**: OpenAI-compatible chat completions and embeddings (1536 dimensions)
//! - **Delivery**: UltraMsg WhatsApp gateway, best-effort
//! - **Transport**: axum webhook server
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite database initialization, schema, metadata, and health checks
//! - [`store`]: Storage collaborator traits and their SQLite implementations
//! - [`embedding`], [`llm`], [`delivery`]: HTTP collaborators
//! - [`memory`]: The memory pipeline components
//! - [`pipeline`]: Per-turn orchestration, timeouts, and error taxonomy
//! - [`server`]: Inbound webhook gateway

pub mod config;
pub mod db;
pub mod delivery;
pub mod embedding;
pub mod llm;
pub mod memory;
pub mod pipeline;
pub mod server;
pub mod store;
