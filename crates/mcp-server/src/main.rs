//! Context Finder MCP Server
//!
//! Provides semantic code search capabilities to AI agents via the MCP
//! protocol. The index lives on disk under `$HOME/.mcp/search/indexes/`,
//! content-addressed per project, and is shared across every client that
//! attaches to the same project path.
//!
//! ## Tools
//!
//! - `create_index` - Build a new semantic index for a project
//! - `reindex_project` - Delete and rebuild a project's index from scratch
//! - `reindex_file` - Incrementally update a single file's chunks
//! - `delete_index` - Stop tracking a project and remove its on-disk index
//! - `search_code` - Semantic search over source code
//! - `search_docs` - Semantic search over documentation
//! - `search_by_path` - Glob match against indexed file paths
//! - `get_index_status` - Indexing state, table stats, and strategy stats
//!
//! ## Usage
//!
//! Add to your MCP client configuration:
//! ```json
//! {
//!   "mcpServers": {
//!     "context-finder": {
//!       "command": "context-finder-mcp"
//!     }
//!   }
//! }
//! ```

use anyhow::Result;
use rmcp::ServiceExt;

mod embedding;
mod error;
mod layout;
mod shutdown;
mod stdio_hybrid;
mod tools;

use stdio_hybrid::stdio_hybrid_server;
use tools::ContextFinderService;

#[tokio::main]
async fn main() -> Result<()> {
    // Configure logging to stderr only (stdout is for MCP protocol).
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    log::info!("starting context finder MCP server");

    let service = ContextFinderService::new();
    service.install_shutdown_hook().await;

    let server = service.serve(stdio_hybrid_server()).await?;

    // Wait for the transport to close, then run the LIFO teardown sequence
    // (strategies stop, fingerprints flush, vector tables close).
    server.waiting().await?;
    service.shutdown_registry().shutdown().await;

    log::info!("context finder MCP server stopped");
    Ok(())
}
