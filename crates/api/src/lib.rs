//! HTTP API: configuration, boundary service, routing, and request/response mapping.

pub mod app;
pub mod config;
pub mod seed;
