//! HTTP implementation of the ordering API

pub mod client;
pub mod config;
pub mod models;

pub use client::HttpOrderingClient;
pub use config::RemoteConfig;
