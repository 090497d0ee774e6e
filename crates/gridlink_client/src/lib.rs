//! # `gridlink_client`
//!
//! Dual-mode document access for Gridlink form widgets.
//!
//! The same widget code runs in two very different places: embedded in
//! the host platform's iframe (where an injected plugin API provides
//! record data), or standalone against a REST proxy. This crate hides
//! the difference behind one trait, [`backend::DocBackend`], and a
//! one-shot mode probe, [`session::DocSession::connect`]:
//!
//! ```text
//! ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//! │ HostBackend   │   │ RestBackend   │   │ MockBackend   │
//! │ (plugin API)  │   │ (REST proxy)  │   │ (dev fixture) │
//! └───────┬───────┘   └───────┬───────┘   └───────┬───────┘
//!         └─────────────┬─────┴─────────────┬─────┘
//!                       ▼                   │
//!              ┌──────────────────┐         │
//!              │ dyn DocBackend   │◄────────┘
//!              └────────┬─────────┘
//!                       ▼
//!              ┌──────────────────┐
//!              │ DocSession       │
//!              │ - mode selection │
//!              │ - column cache   │
//!              │ - ref cache      │
//!              └──────────────────┘
//! ```
//!
//! When no backend is reachable the session is `Unavailable`: every data
//! call fails with [`gridlink_core::GridlinkError::Unavailable`] and no
//! network traffic is attempted.

pub mod backend;
pub mod columns;
pub mod config;
pub mod host;
pub mod mock;
pub mod notify;
pub mod refs;
pub mod rest;
pub mod session;

pub use backend::{AttachmentUpload, DocBackend, RowFilter};
pub use config::ClientConfig;
pub use host::{AccessToken, HostApi, HostBackend, RecordCallback};
pub use mock::{MemoryMockStore, MockBackend, MockStore};
pub use notify::{Enrichment, Notifier};
pub use refs::{RefCache, RefDisplayRow, ResolvedRefs};
pub use rest::RestBackend;
pub use session::{DocSession, SessionMode};
