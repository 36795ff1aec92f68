// HTTP API (routing, handlers, error mapping)
pub mod api;

// OAuth state and server-side sessions
pub mod auth;

// Environment configuration
pub mod config;

// Encrypted credential storage
pub mod credentials;

// Service error taxonomy
pub mod error;

// Orchestration over the token manager and Spotify client
pub mod services;

// Spotify Web API client and token lifecycle
pub mod spotify;
