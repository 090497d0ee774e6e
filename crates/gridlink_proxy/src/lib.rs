//! REST proxy for Gridlink widgets running outside the host iframe.
//!
//! The widget speaks a deliberately small surface (`GET/POST/PATCH
//! ?table=`, `/columns`, multipart attachment upload); this server
//! translates it into the grid platform's authenticated REST API,
//! injecting the API key server-side so it never reaches the browser,
//! enforcing a table allow-list, and optionally gating record access
//! behind signed magic-link tokens.

pub mod config;
pub mod handlers;
pub mod link;
pub mod upstream;

pub use config::{Config, ConfigError};
pub use handlers::{proxy_routes, ProxyState};
pub use link::{LinkSigner, RecordToken};
pub use upstream::{DocUpstream, InMemoryUpstream, PlatformUpstream, UploadedFile};
