//! Spotify Web API integration.
//!
//! - `client` - authenticated GETs, pagination, rate-limit backoff
//! - `token` - OAuth token lifecycle (exchange, refresh, rotation)
//! - `normalize` - reshaping raw API JSON into the service's output schema

pub mod client;
pub mod normalize;
pub mod token;

pub use client::{Page, SpotifyClient};
pub use token::{Profile, TokenBundle, TokenManager};
