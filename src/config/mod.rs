//! Configuration Management
//!
//! This module handles loading and managing configuration including API credentials.

pub mod client;
pub mod credentials;
pub mod stream;

// Re-export
pub use client::{ClientConfig, RetryPolicy};
pub use credentials::{Credentials, NonceListener, SecretString};
pub use stream::{CacheConfig, PusherConfig};
