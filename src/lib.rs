//! # Showreel
//!
//! A video-sharing backend, usable both as a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! showreel = "0.1"
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::path::PathBuf;
//! use showreel::auth::AuthConfig;
//! use showreel::media::MediaStorage;
//! use showreel::server::{AppState, create_router};
//! use showreel::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new(&PathBuf::from("./data/showreel.db")).unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState {
//!     store: Arc::new(store),
//!     media: MediaStorage::new(&PathBuf::from("./data")),
//!     auth: AuthConfig::from_env().unwrap(),
//! });
//! let router = create_router(state);
//! // Serve with axum...
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod media;
pub mod server;
pub mod store;
pub mod types;
