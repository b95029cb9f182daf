// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Rate Limiting
//!
//! Fixed-window request counting per `(policy, key)`.
//!
//! ## Policies
//!
//! | Policy | Surface | Default |
//! |--------|---------|---------|
//! | `Auth` | wallet login | 10 / 15 min |
//! | `WalletMutation` | privileged metadata writes | 30 / 15 min |
//! | `GeneralApi` | everything under `/v1` | 300 / 15 min |
//! | `RpcProxy` | `/rpc` passthrough | 120 / 1 min |
//!
//! Policies never share counters, so abuse on one surface cannot drain the
//! quota of another. The wallet-mutation ceiling must stay strictly below the
//! general API ceiling; [`RateLimitSettings::validate`] enforces it at startup.
//!
//! ## Keys
//!
//! See [`derive_key`]: session address, then client IP, then a shared
//! anonymous bucket.
//!
//! ## Limitations
//!
//! Counters live in process memory. Several gateway instances behind a load
//! balancer each keep their own counters; a shared store would be needed for
//! a global limit.

pub mod middleware;

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::auth::address::normalize_address;

/// Bucket shared by callers with neither a session nor a known IP.
pub const ANONYMOUS_BUCKET: &str = "anonymous";

/// How often the housekeeping task sweeps expired counters.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Longest window any policy may use.
pub const MAX_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Independently configured rate-limit surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    Auth,
    WalletMutation,
    GeneralApi,
    RpcProxy,
}

impl Policy {
    pub const ALL: [Policy; 4] = [
        Policy::Auth,
        Policy::WalletMutation,
        Policy::GeneralApi,
        Policy::RpcProxy,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Policy::Auth => "auth",
            Policy::WalletMutation => "wallet_mutation",
            Policy::GeneralApi => "general_api",
            Policy::RpcProxy => "rpc_proxy",
        }
    }
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Window length and request ceiling of one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyLimits {
    pub window: Duration,
    pub ceiling: u32,
}

impl PolicyLimits {
    pub const fn new(ceiling: u32, window_secs: u64) -> Self {
        Self {
            window: Duration::from_secs(window_secs),
            ceiling,
        }
    }
}

/// Limits for all four policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub auth: PolicyLimits,
    pub wallet_mutation: PolicyLimits,
    pub general_api: PolicyLimits,
    pub rpc_proxy: PolicyLimits,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            auth: PolicyLimits::new(10, 900),
            wallet_mutation: PolicyLimits::new(30, 900),
            general_api: PolicyLimits::new(300, 900),
            rpc_proxy: PolicyLimits::new(120, 60),
        }
    }
}

impl RateLimitSettings {
    pub fn limits(&self, policy: Policy) -> PolicyLimits {
        match policy {
            Policy::Auth => self.auth,
            Policy::WalletMutation => self.wallet_mutation,
            Policy::GeneralApi => self.general_api,
            Policy::RpcProxy => self.rpc_proxy,
        }
    }

    /// Check the startup invariants: non-zero limits, windows no longer than
    /// [`MAX_WINDOW`], and a privileged mutation ceiling strictly below the
    /// general API ceiling.
    pub fn validate(&self) -> Result<(), String> {
        for policy in Policy::ALL {
            let limits = self.limits(policy);
            if limits.ceiling == 0 {
                return Err(format!("{policy} ceiling must be greater than zero"));
            }
            if limits.window.is_zero() {
                return Err(format!("{policy} window must be greater than zero"));
            }
            if limits.window > MAX_WINDOW {
                return Err(format!(
                    "{policy} window must be at most {} seconds",
                    MAX_WINDOW.as_secs()
                ));
            }
        }

        if self.wallet_mutation.ceiling >= self.general_api.ceiling {
            return Err(format!(
                "wallet_mutation ceiling ({}) must be below general_api ceiling ({})",
                self.wallet_mutation.ceiling, self.general_api.ceiling
            ));
        }

        Ok(())
    }
}

/// Outcome of a single [`RateLimiter::consume`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Time until the current window closes. Only set on rejection.
    pub retry_after: Option<Duration>,
}

#[derive(Debug, Clone)]
struct WindowCounter {
    count: u32,
    window_start: Instant,
}

/// In-process fixed-window rate limiter.
///
/// Cloning is cheap and shares the counters.
#[derive(Clone)]
pub struct RateLimiter {
    counters: Arc<DashMap<(Policy, String), WindowCounter>>,
    settings: RateLimitSettings,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            counters: Arc::new(DashMap::new()),
            settings,
        }
    }

    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    /// Count one request for `key` under `policy`.
    pub fn consume(&self, policy: Policy, key: &str) -> RateDecision {
        self.consume_at(policy, key, Instant::now())
    }

    /// [`consume`](Self::consume) against an explicit clock reading.
    pub fn consume_at(&self, policy: Policy, key: &str, now: Instant) -> RateDecision {
        let limits = self.settings.limits(policy);

        // The entry guard holds the shard lock, so the reset-increment-compare
        // sequence is atomic per key.
        let mut counter = self
            .counters
            .entry((policy, key.to_string()))
            .or_insert_with(|| WindowCounter {
                count: 0,
                window_start: now,
            });

        if now.saturating_duration_since(counter.window_start) >= limits.window {
            counter.count = 0;
            counter.window_start = now;
        }

        counter.count = counter.count.saturating_add(1);

        if counter.count <= limits.ceiling {
            RateDecision {
                allowed: true,
                retry_after: None,
            }
        } else {
            let elapsed = now.saturating_duration_since(counter.window_start);
            RateDecision {
                allowed: false,
                retry_after: Some(limits.window.saturating_sub(elapsed)),
            }
        }
    }

    /// Drop counters whose window closed at least one full window ago.
    pub fn evict_expired_at(&self, now: Instant) -> usize {
        let before = self.counters.len();
        let settings = self.settings;
        self.counters.retain(|(policy, _), counter| {
            let window = settings.limits(*policy).window;
            now.saturating_duration_since(counter.window_start) < window.saturating_mul(2)
        });
        before - self.counters.len()
    }

    /// Number of live `(policy, key)` counters.
    pub fn tracked_keys(&self) -> usize {
        self.counters.len()
    }

    /// Spawn the housekeeping sweep; it stops when `shutdown` is cancelled.
    pub fn start_cleanup_task(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let limiter = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let evicted = limiter.evict_expired_at(Instant::now());
                        if evicted > 0 {
                            debug!(evicted, remaining = limiter.tracked_keys(), "Evicted rate-limit counters");
                        }
                    }
                    _ = shutdown.cancelled() => {
                        info!("Rate-limit housekeeping shutting down");
                        return;
                    }
                }
            }
        })
    }
}

/// Rate-limit key for a caller.
///
/// Precedence: authenticated session address, then client network address,
/// then [`ANONYMOUS_BUCKET`]. Callers that omit identity still land in a
/// bucket and cannot bypass the limit.
pub fn derive_key(identity: Option<&str>, client_ip: Option<IpAddr>) -> String {
    if let Some(address) = identity.and_then(normalize_address) {
        return format!("addr:{address}");
    }
    match client_ip {
        Some(ip) => format!("ip:{ip}"),
        None => ANONYMOUS_BUCKET.to_string(),
    }
}
