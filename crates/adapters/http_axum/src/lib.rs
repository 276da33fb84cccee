//! # martha-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the **JSON API** the dashboard and scripts talk to
//!   (`/api/status`, `/api/config`, `/api/relay/{ch}/set`, …)
//! - Push one **live snapshot** per broadcast period to every `/ws` client
//! - Stream accepted relay changes as **Server-Sent Events**
//! - Serve the **server-rendered dashboard** at `/`
//!
//! ## Dashboard
//! Rendered with askama and no JavaScript. Controls are `<form>` elements
//! that POST back and redirect (PRG pattern); the page reloads itself with
//! `<meta http-equiv="refresh">`.
//!
//! ## WebSocket
//! Push only. Anything a client sends is ignored; commands go through the
//! REST API.
//!
//! ## Dependency rule
//! Depends on `martha-app` (ports and services) and `martha-domain` (types
//! used in request/response mapping). Never leaks axum types into the domain.

pub mod api;
pub mod dashboard;
pub mod error;
pub mod router;
pub mod state;
pub mod ws;

#[cfg(test)]
mod testing;
