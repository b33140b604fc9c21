// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Solace Server - bearer token verification service
//!
//! Verifies Clerk-issued JWTs presented as `Authorization: Bearer` credentials
//! and exposes the verified identity to HTTP handlers.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Credential extraction, key provisioning, token verification
//! - `config` - Environment-driven server and auth settings

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;
