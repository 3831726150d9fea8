// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Provide a process-wide shutdown signal for async tasks and worker threads.
// Author: Lukas Bower

//! Process-wide shutdown signal.
//!
//! Async tasks await [`Shutdown::wait`]; reflector threads park in
//! [`Shutdown::sleep`], which returns early once the signal fires.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use tokio::sync::watch;

#[derive(Debug)]
struct Inner {
    tx: watch::Sender<bool>,
    fired: Mutex<bool>,
    parked: Condvar,
}

/// Cloneable shutdown handle shared by every component.
#[derive(Debug, Clone)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    /// Create an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                tx,
                fired: Mutex::new(false),
                parked: Condvar::new(),
            }),
        }
    }

    /// Fire the signal. Idempotent.
    pub fn trigger(&self) {
        let mut fired = self.inner.fired.lock().expect("poisoned shutdown lock");
        *fired = true;
        self.inner.tx.send_replace(true);
        self.inner.parked.notify_all();
    }

    /// Return whether the signal has fired.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.inner.tx.borrow()
    }

    /// Resolve once the signal fires.
    pub async fn wait(&self) {
        let mut rx = self.inner.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|fired| *fired).await;
    }

    /// Block the calling thread for up to `timeout`. Returns true when the
    /// signal fired before the timeout elapsed.
    pub fn sleep(&self, timeout: Duration) -> bool {
        let fired = self.inner.fired.lock().expect("poisoned shutdown lock");
        let (fired, _) = self
            .inner
            .parked
            .wait_timeout_while(fired, timeout, |fired| !*fired)
            .expect("poisoned shutdown lock");
        *fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn sleep_returns_early_once_triggered() {
        let shutdown = Shutdown::new();
        let trigger = shutdown.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            trigger.trigger();
        });
        let started = Instant::now();
        assert!(shutdown.sleep(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(30));
        handle.join().expect("trigger thread");
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn sleep_times_out_when_not_triggered() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.sleep(Duration::from_millis(5)));
    }

    #[tokio::test]
    async fn wait_resolves_after_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.wait().await;
    }
}
