//! HTTP and RPC transports for fnhost.
//!
//! Both transports are thin layers over the shared [`Registry`], event bus,
//! and metrics collector held in [`AppState`]:
//!
//! - HTTP: run functions, list them, publish events, read metrics
//! - RPC: `ExecuteFunction` / `ListFunctions` as JSON over `POST`
//!
//! Function bodies are blocking code, so every execution is moved onto
//! tokio's blocking pool.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use fnhost_core::{FunctionContext, Registry};
//! use fnhost_server::{AppState, FnHostServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(Registry::new(None, FunctionContext::default()));
//!     let state = AppState::new(registry, true);
//!
//!     FnHostServer::new(state, ServerConfig::default()).run().await?;
//!     Ok(())
//! }
//! ```
//!
//! [`Registry`]: fnhost_core::Registry

pub mod handler;
pub mod response;
pub mod router;
pub mod rpc;
pub mod server;
pub mod state;

pub use response::ApiResponse;
pub use server::{FnHostServer, ServerConfig, TestHandle};
pub use state::AppState;
