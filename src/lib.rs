/// Soundtrack server
///
/// REST backend that turns a listener's quiz answers into a generated
/// playlist: free playlists immediately, premium ones after checkout.

pub mod account;
pub mod admin;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod generator;
pub mod jobs;
pub mod mailer;
pub mod metrics;
pub mod payment;
pub mod playlist;
pub mod quiz;
pub mod rate_limit;
pub mod server;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{AppError, AppResult};
