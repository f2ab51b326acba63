pub mod auth;
pub mod client;
pub mod models;

pub use auth::SpotifyTokenRefresher;
pub use client::SpotifyCatalog;
