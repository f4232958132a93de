//! Model Context Protocol (MCP) server handling and JSON-RPC implementations
//!
//! Provides JSON-RPC framing, method routing, the tool registry, and the
//! line-oriented stdio transport.

pub mod registry;
pub mod rpc;
pub mod server;
pub mod transport;
