//! # Product Docs MCP Server
//!
//! A Model Context Protocol (MCP) server that lets an LLM answer product
//! questions from several knowledge sources at once.
//!
//! ## Sources
//!
//! - The internal YouTrack knowledge base (bearer token)
//! - The public help center (no auth)
//! - GitHub code and repository search (optional, enabled by a token)
//!
//! ## Modules
//!
//! - `server`: MCP server implementation and tools
//! - `aggregator`: concurrent fan-out over every source for a single question
//! - `youtrack`, `support`, `github`: one client per upstream
//! - `source`: the trait the aggregator fans out over
//! - `config`, `error`, `http`: shared plumbing

/// Server implementation and MCP tools
pub mod server;
/// Question fan-out across all sources
pub mod aggregator;
/// Upstream abstraction used by the aggregator
pub mod source;
/// YouTrack knowledge base client
pub mod youtrack;
/// Help center client and HTML normalization
pub mod support;
/// GitHub API integration
pub mod github;
/// Startup configuration
pub mod config;
/// Client error types
pub mod error;
/// Shared HTTP helpers
pub mod http;
