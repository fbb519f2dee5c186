//! Shared session record

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info};

use crate::models::{Credentials, SyncKey};

struct Inner {
    credentials: Credentials,
    cursor: SyncKey,
    logged_in: bool,
}

/// Credentials, sync cursor and logged-in flag of one session
///
/// All access goes through the methods below, which serialize on a single
/// mutex that is never held across I/O. Readers always get a snapshot of the
/// most recently committed cursor, never a half-updated one.
pub struct SessionState {
    inner: Mutex<Inner>,
}

impl SessionState {
    /// Create a logged-in session from credentials produced by login
    pub fn new(credentials: Credentials, cursor: SyncKey) -> Self {
        Self {
            inner: Mutex::new(Inner {
                credentials,
                cursor,
                logged_in: true,
            }),
        }
    }

    // Every update is a single assignment, so a poisoned lock still guards
    // consistent data.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the credentials
    pub fn credentials(&self) -> Credentials {
        self.lock().credentials.clone()
    }

    /// Snapshot of the current cursor
    pub fn cursor(&self) -> SyncKey {
        self.lock().cursor.clone()
    }

    /// Credentials and cursor read under the same lock
    pub fn snapshot(&self) -> (Credentials, SyncKey) {
        let inner = self.lock();
        (inner.credentials.clone(), inner.cursor.clone())
    }

    /// Replace the cursor with the value a sync response carried
    pub fn update_cursor(&self, cursor: SyncKey) {
        let mut inner = self.lock();
        debug!("Cursor {} -> {}", inner.cursor, cursor);
        inner.cursor = cursor;
    }

    /// Record that the gateway invalidated the session
    ///
    /// One-way and idempotent. Returns `true` only for the call that
    /// performed the transition.
    pub fn mark_logged_out(&self) -> bool {
        let mut inner = self.lock();
        if !inner.logged_in {
            return false;
        }
        inner.logged_in = false;
        info!("Session {} marked logged out", inner.credentials.uin());
        true
    }

    pub fn is_logged_in(&self) -> bool {
        self.lock().logged_in
    }
}
