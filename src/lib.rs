// Configuration (TOML + environment)
pub mod config;

// Shop credential storage
pub mod credentials;

// Error taxonomy and HTTP mapping
pub mod error;

// HTTP APIs (OAuth flow, question proxy)
pub mod api;
