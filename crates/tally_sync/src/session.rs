//! Offline session cache
//!
//! The identity last confirmed while online is kept under `offlineSession`
//! and honored for a fixed period when the boundary cannot be reached.

use crate::store::{keys, LocalStore};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tally_common::sanitizer::redact;
use tally_common::Identity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSession {
    pub user: Identity,
    pub expires: DateTime<Utc>,
    /// When the session was cached, in epoch milliseconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// Outcome of resolving the current session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Authenticated { user: Identity, offline: bool },
    /// Sign-in attempted offline without a usable cached session
    SignInPending,
    Unauthenticated,
}

impl SessionStatus {
    pub fn user(&self) -> Option<&Identity> {
        match self {
            SessionStatus::Authenticated { user, .. } => Some(user),
            SessionStatus::SignInPending | SessionStatus::Unauthenticated => None,
        }
    }
}

/// Longest offline session lifetime accepted from configuration
pub const MAX_TTL_DAYS: u64 = 3650;

#[derive(Debug, Clone)]
pub struct SessionCache {
    store: LocalStore,
    ttl: Duration,
}

impl SessionCache {
    /// Lifetimes above [`MAX_TTL_DAYS`] are clamped
    pub fn new(store: LocalStore, ttl_days: u64) -> Self {
        let days = i64::try_from(ttl_days.min(MAX_TTL_DAYS)).unwrap_or(0);
        Self {
            store,
            ttl: Duration::try_days(days).unwrap_or_else(Duration::zero),
        }
    }

    /// Cache a confirmed identity, replacing any previous one
    pub fn remember(&self, user: &Identity, now: DateTime<Utc>) -> CachedSession {
        let session = CachedSession {
            user: user.clone(),
            expires: now.checked_add_signed(self.ttl).unwrap_or(now),
            timestamp: now,
        };
        self.store.set(keys::OFFLINE_SESSION, &session);
        tracing::debug!("Cached session for {}", redact(&user.email));
        session
    }

    /// The cached session if still valid; an expired entry is deleted
    ///
    /// A session stops being valid at the instant it expires.
    pub fn load(&self, now: DateTime<Utc>) -> Option<CachedSession> {
        let session: CachedSession = self.store.get(keys::OFFLINE_SESSION)?;
        if now >= session.expires {
            tracing::info!("Cached session for {} expired", redact(&session.user.email));
            self.clear();
            return None;
        }
        Some(session)
    }

    pub fn clear(&self) {
        self.store.remove(keys::OFFLINE_SESSION);
    }

    /// Decide who is signed in
    ///
    /// Online, the live identity wins and is re-cached. Offline, a valid
    /// cached identity keeps the user signed in; without one, a sign-in
    /// attempt stays pending until the boundary is reachable.
    pub fn resolve(
        &self,
        online: bool,
        live: Option<&Identity>,
        now: DateTime<Utc>,
    ) -> SessionStatus {
        if online {
            return match live {
                Some(user) => {
                    self.remember(user, now);
                    SessionStatus::Authenticated {
                        user: user.clone(),
                        offline: false,
                    }
                }
                None => SessionStatus::Unauthenticated,
            };
        }

        match self.load(now) {
            Some(session) => SessionStatus::Authenticated {
                user: session.user,
                offline: true,
            },
            None if live.is_some() => SessionStatus::SignInPending,
            None => SessionStatus::Unauthenticated,
        }
    }
}
