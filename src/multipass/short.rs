//! Single-use, self-expiring short links.
//!
//! Every entry is removed exactly once: either by the first `lookup` or by its
//! expiry timer, whichever takes the table lock first. Timers hold a weak
//! reference to the table and carry the generation of the entry they were
//! scheduled for, so a stale timer never evicts a code that was re-added.

use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::debug;

use super::error::Error;

/// URL-safe symbols codes are drawn from.
pub const ALPHABET: &[u8; 64] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890-_";

/// Fresh codes tried by `shorten` before giving up.
const MAX_ATTEMPTS: usize = 8;

/// Random code of `length` symbols from `ALPHABET`, using the OS RNG.
#[must_use]
pub fn random_code(length: usize) -> String {
    let mut rng = rand::rngs::OsRng;
    (0..length)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect()
}

#[derive(Debug)]
struct Entry {
    target: String,
    generation: u64,
    expires_at: Instant,
    timer: AbortHandle,
}

#[derive(Debug, Default)]
struct Entries {
    live: HashMap<String, Entry>,
    next_generation: u64,
}

#[derive(Debug, Default)]
pub struct ShortLinkTable {
    entries: Arc<Mutex<Entries>>,
}

impl ShortLinkTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `target` under `code` for `ttl`.
    ///
    /// # Errors
    /// Returns `Error::CodeInUse` if `code` is live; the existing entry is left
    /// untouched.
    pub async fn add(&self, code: &str, target: &str, ttl: Duration) -> Result<(), Error> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        if let Some(existing) = entries.live.get(code) {
            if existing.expires_at > now {
                return Err(Error::CodeInUse);
            }
            // Past its deadline but the timer has not run yet.
            existing.timer.abort();
        }

        let generation = entries.next_generation;
        entries.next_generation = entries.next_generation.wrapping_add(1);

        let timer = tokio::spawn(expire(
            Arc::downgrade(&self.entries),
            code.to_string(),
            generation,
            ttl,
        ))
        .abort_handle();

        entries.live.insert(
            code.to_string(),
            Entry {
                target: target.to_string(),
                generation,
                expires_at: now + ttl,
                timer,
            },
        );
        Ok(())
    }

    /// Remove and return the target for `code`. At most one caller ever sees a
    /// given entry.
    pub async fn lookup(&self, code: &str) -> Option<String> {
        let entry = self.entries.lock().await.live.remove(code)?;
        entry.timer.abort();
        (entry.expires_at > Instant::now()).then_some(entry.target)
    }

    /// Store `target` under a fresh random code of `length` symbols and return
    /// the code, retrying on collisions.
    ///
    /// # Errors
    /// Returns `Error::CodeInUse` if every attempt collided.
    pub async fn shorten(
        &self,
        target: &str,
        ttl: Duration,
        length: usize,
    ) -> Result<String, Error> {
        for attempt in 1..=MAX_ATTEMPTS {
            let code = random_code(length);
            match self.add(&code, target, ttl).await {
                Ok(()) => return Ok(code),
                Err(Error::CodeInUse) => debug!(attempt, "short link code collision"),
                Err(e) => return Err(e),
            }
        }
        Err(Error::CodeInUse)
    }

    /// Number of entries not yet removed.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.live.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

async fn expire(entries: Weak<Mutex<Entries>>, code: String, generation: u64, ttl: Duration) {
    tokio::time::sleep(ttl).await;
    let Some(entries) = entries.upgrade() else {
        return;
    };
    let mut entries = entries.lock().await;
    if entries
        .live
        .get(&code)
        .is_some_and(|entry| entry.generation == generation)
    {
        entries.live.remove(&code);
        debug!("short link expired");
    }
}
