// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session and CSRF cookies.
//!
//! | Cookie | HttpOnly | Purpose |
//! |--------|----------|---------|
//! | `session` | yes | signed session token |
//! | `csrf_token` | no | double-submit token, read by the frontend |
//!
//! In production both are `Secure` and, when `COOKIE_DOMAIN` is set, scoped
//! to that parent domain so every subdomain shares them. In development they
//! are host-only and sent over plain HTTP. Clearing uses the exact same
//! attributes, otherwise browsers keep the original cookie.

use std::time::Duration;

use axum::http::{header::COOKIE, HeaderMap, HeaderValue};

use crate::config::Environment;

pub const SESSION_COOKIE: &str = "session";
pub const CSRF_COOKIE: &str = "csrf_token";

/// Attributes shared by both cookies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePolicy {
    secure: bool,
    domain: Option<String>,
    max_age: Duration,
}

impl CookiePolicy {
    pub fn new(environment: Environment, domain: Option<String>, max_age: Duration) -> Self {
        match environment {
            Environment::Production => Self {
                secure: true,
                domain,
                max_age,
            },
            Environment::Development => Self {
                secure: false,
                domain: None,
                max_age,
            },
        }
    }

    pub fn session_cookie(&self, token: &str) -> HeaderValue {
        self.build(SESSION_COOKIE, token, self.max_age.as_secs(), true)
    }

    pub fn csrf_cookie(&self, token: &str) -> HeaderValue {
        self.build(CSRF_COOKIE, token, self.max_age.as_secs(), false)
    }

    pub fn clear_session_cookie(&self) -> HeaderValue {
        self.build(SESSION_COOKIE, "", 0, true)
    }

    pub fn clear_csrf_cookie(&self) -> HeaderValue {
        self.build(CSRF_COOKIE, "", 0, false)
    }

    fn build(&self, name: &str, value: &str, max_age: u64, http_only: bool) -> HeaderValue {
        let mut cookie = format!("{name}={value}; Path=/; Max-Age={max_age}; SameSite=Lax");
        if http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        if let Some(domain) = &self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }

        // Values are base64url/JWT text and the domain is validated at
        // startup, so this only fails on a programming error.
        HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
    }
}

/// Read a cookie value from every `Cookie` header on the request.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
