//! AgentDesk
//!
//! Backend for configuring AI chat agents, embedding them on websites and billing
//! their owners by plan.
//!
//! ## Standalone
//!
//! Run the binary:
//! ```bash
//! agentdesk-server
//! ```
//!
//! ## Embedded (Axum)
//!
//! When the `server` feature is enabled, the router can be mounted inside a larger Axum app:
//! ```rust,ignore
//! use axum::Router;
//! use agentdesk::infrastructure::AppConfig;
//! use agentdesk::server::{build_state_with_pool, router};
//! use sqlx::PgPool;
//!
//! let cfg = AppConfig::from_env()?;
//! let pool = PgPool::connect(&cfg.database_url).await?;
//! let state = build_state_with_pool(cfg, pool, true).await?;
//! let app = Router::new().nest("/agentdesk", router(state));
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

// Axum server lives behind the `server` feature so the services can be used without it.
#[cfg(feature = "server")]
pub mod server;

pub use application::*;
pub use domain::*;
pub use infrastructure::*;

#[cfg(feature = "server")]
pub use server::*;
