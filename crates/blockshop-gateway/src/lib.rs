// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for Blockshop.
//!
//! A thin axum layer over the purchase orchestrator, delivery queue and
//! command dispatcher. Store routes are public; operator routes sit behind
//! a bearer token.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use handlers::{ApiError, ApiResponse};
pub use server::{GatewayState, ServerConfig, router, start_server};
