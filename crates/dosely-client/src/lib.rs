//! # dosely-client: REST Adapter & List Synchronization for Dosely
//!
//! Everything in Dosely that has a side effect: HTTP calls to the stock and
//! user service, the persisted session token, and the stock list held in
//! memory for one view.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Client Architecture                              │
//! │                                                                         │
//! │  ┌──────────────────────────────┐    ┌──────────────────────────────┐  │
//! │  │    StockListSynchronizer     │◄───│        StockEditor           │  │
//! │  │                              │    │                              │  │
//! │  │ Pages, dedupe, optimistic    │    │ Add / edit / delete          │  │
//! │  │ delete with rollback,        │    │ medicines, rename; reports   │  │
//! │  │ sentinel trigger, teardown   │    │ fresh stock to the list      │  │
//! │  └──────────────┬───────────────┘    └──────────────┬───────────────┘  │
//! │                 │          StockApi trait            │                  │
//! │                 └──────────────────┬─────────────────┘                  │
//! │                                    ▼                                    │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  HttpApi (reqwest)                                               │  │
//! │  │  bearer token + x-request-id on every call                      │  │
//! │  │  401 ──► SessionStore::invalidate() ──► AuthState::Expired      │  │
//! │  └──────────────────────────────────┬───────────────────────────────┘  │
//! │                                     ▼                                   │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  SessionStore ──► TokenStorage (session.json under data dir)     │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`api`] - `StockApi` / `AuthApi` traits and the `HttpApi` adapter
//! - [`config`] - Client configuration (API URL, page size, session file)
//! - [`editor`] - Detail editor for one stock
//! - [`error`] - Client error types
//! - [`session`] - Session token store
//! - [`synchronizer`] - Paginated stock list
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dosely_client::{ClientConfig, FileTokenStorage, HttpApi, SessionStore, StockListSynchronizer};
//!
//! let config = ClientConfig::load_or_default(None);
//! let storage = FileTokenStorage::new(config.session.resolved_storage_path().unwrap());
//! let session = Arc::new(SessionStore::open(Arc::new(storage), &config.session.token_key)?);
//! let api = Arc::new(HttpApi::new(&config, session)?);
//!
//! let list = StockListSynchronizer::new(api, config.page_size());
//! list.reset_and_load_first_page().await?;
//! while list.on_sentinel_visible().await? {}
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod api;
pub mod config;
pub mod editor;
pub mod error;
pub mod session;
pub mod synchronizer;

// =============================================================================
// Re-exports
// =============================================================================

pub use api::{AuthApi, HttpApi, StockApi};
pub use config::{ApiSettings, ClientConfig, SessionSettings};
pub use editor::StockEditor;
pub use error::{ClientError, ClientResult, ErrorKind};
pub use session::{AuthState, FileTokenStorage, MemoryTokenStorage, SessionStore, TokenStorage};
pub use synchronizer::{
    ListEventEmitter, ListSnapshot, LoadPhase, NoOpEmitter, StockListSynchronizer,
};
