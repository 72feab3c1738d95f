//! `netops-api` — the HTTP/WebSocket surface and process entrypoint.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
pub mod scheduler;
