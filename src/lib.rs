//! Library crate for trivia-arena-back, exposing modules for binaries and integration tests.

/// Bearer-token authentication.
pub mod auth;
/// File and environment configuration.
pub mod config;
/// Entities and storage backends.
pub mod dao;
/// Request and response payloads.
pub mod dto;
/// Service and HTTP errors.
pub mod error;
/// LLM chat gateway.
pub mod gateway;
/// HTTP routers.
pub mod routes;
/// Business logic.
pub mod services;
/// Shared state and per-session runtimes.
pub mod state;
