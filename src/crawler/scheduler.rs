//! Per-host request pacing
//!
//! Each host has a one-permit semaphore (the pacing token) and the time of the
//! last request made to it. Requests to the same host serialize on the token;
//! requests to different hosts never wait on each other.

use super::Pacing;
use crate::url::host_key;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep_until, Instant};
use tracing::debug;
use url::Url;

/// Pacing state of one host
#[derive(Debug)]
struct HostSlot {
    token: Semaphore,
    last: Mutex<Option<Instant>>,
}

impl HostSlot {
    fn new() -> Self {
        Self {
            token: Semaphore::new(1),
            last: Mutex::new(None),
        }
    }

    fn last(&self) -> Option<Instant> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_last(&self, at: Instant) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(at);
    }
}

/// Default [`Pacing`] implementation
#[derive(Debug, Default)]
pub struct Pacer {
    hosts: RwLock<HashMap<String, Arc<HostSlot>>>,
}

impl Pacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of hosts with pacing state
    pub fn host_count(&self) -> usize {
        self.hosts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn key(url: &Url) -> String {
        host_key(url).unwrap_or_else(|_| url.as_str().to_string())
    }

    fn slot(&self, url: &Url) -> Arc<HostSlot> {
        let key = Self::key(url);

        if let Some(slot) = self
            .hosts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(slot);
        }

        let mut hosts = self.hosts.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(hosts.entry(key).or_insert_with(|| Arc::new(HostSlot::new())))
    }

    fn existing_slot(&self, url: &Url) -> Option<Arc<HostSlot>> {
        self.hosts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&Self::key(url))
            .cloned()
    }
}

#[async_trait(?Send)]
impl Pacing for Pacer {
    async fn wait(&self, url: &Url, delay: Duration) {
        let slot = self.slot(url);

        // The token stays taken until `done`.
        match slot.token.acquire().await {
            Ok(permit) => permit.forget(),
            Err(_) => return,
        }

        if let Some(last) = slot.last() {
            let ready_at = last + delay;
            if ready_at > Instant::now() {
                debug!(host = %Self::key(url), ?delay, "Pacing request");
                sleep_until(ready_at).await;
            }
        }
    }

    fn done(&self, url: &Url) {
        if let Some(slot) = self.existing_slot(url) {
            if slot.token.available_permits() == 0 {
                slot.token.add_permits(1);
            }
        }
    }

    fn stamp(&self, url: &Url) {
        self.slot(url).set_last(Instant::now());
    }

    fn reset(&self) {
        self.hosts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
