//! Reasoning-backend plumbing for compass: message types, the provider
//! trait, HTTP transports and test doubles.

pub mod http;
pub mod provider;
