// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Crowdfund Gateway - wallet-authenticated API for the
//! crowdfunding contract
//!
//! Browsers sign in with an EIP-191 wallet signature and receive a stateless
//! session cookie. Off-chain project metadata may only be changed by the
//! project's current on-chain owner, checked against the contract on every
//! mutation.
//!
//! ## Modules
//!
//! - `api` - HTTP routes and handlers (Axum)
//! - `auth` - Wallet login, sessions, cookies and CSRF
//! - `blockchain` - Contract bindings, ownership checks, RPC passthrough
//! - `policy` - Ordered gate sequences for login and metadata mutations
//! - `ratelimit` - Fixed-window limits per identity
//! - `storage` - Project metadata stores (in-memory, redb)

pub mod api;
pub mod auth;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod models;
pub mod policy;
pub mod ratelimit;
pub mod state;
pub mod storage;
pub mod tls;
pub mod validation;
