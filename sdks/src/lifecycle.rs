// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Plugin lifecycle tracking
//!
//! `Constructed → Initialized → Running → Stopped`. `Running` covers any
//! number of concurrent `Run`/`SubscribeTrigger` streams. `Stop` cancels the
//! token every open stream watches; a later `Init` arms a fresh one.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Constructed,
    Initialized,
    Running,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Constructed => "constructed",
            LifecycleState::Initialized => "initialized",
            LifecycleState::Running => "running",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("plugin is stopped")]
pub struct PluginStopped;

struct Inner {
    state: LifecycleState,
    stop: CancellationToken,
}

#[derive(Clone)]
pub struct Lifecycle {
    inner: Arc<Mutex<Inner>>,
    active_streams: Arc<AtomicUsize>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: LifecycleState::Constructed,
                stop: CancellationToken::new(),
            })),
            active_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    pub fn active_streams(&self) -> usize {
        self.active_streams.load(Ordering::SeqCst)
    }

    pub fn initialize(&self) {
        let mut inner = self.inner.lock();
        if inner.state == LifecycleState::Stopped {
            inner.stop = CancellationToken::new();
        }
        inner.state = LifecycleState::Initialized;
    }

    /// Admit a new stream. The returned guard keeps the active count accurate
    /// and carries the stop token the stream must observe.
    pub fn begin_stream(&self) -> Result<StreamGuard, PluginStopped> {
        let mut inner = self.inner.lock();
        if inner.state == LifecycleState::Stopped {
            return Err(PluginStopped);
        }
        inner.state = LifecycleState::Running;
        self.active_streams.fetch_add(1, Ordering::SeqCst);
        Ok(StreamGuard {
            stop: inner.stop.clone(),
            active_streams: self.active_streams.clone(),
        })
    }

    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        inner.state = LifecycleState::Stopped;
        inner.stop.cancel();
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

pub struct StreamGuard {
    stop: CancellationToken,
    active_streams: Arc<AtomicUsize>,
}

impl StreamGuard {
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.active_streams.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LifecycleState::Constructed);

        lifecycle.initialize();
        assert_eq!(lifecycle.state(), LifecycleState::Initialized);

        let guard = lifecycle.begin_stream().unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Running);
        assert_eq!(lifecycle.active_streams(), 1);

        lifecycle.stop();
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
        assert!(guard.stop_token().is_cancelled());

        drop(guard);
        assert_eq!(lifecycle.active_streams(), 0);
    }

    #[test]
    fn test_streams_rejected_until_reinitialized() {
        let lifecycle = Lifecycle::new();
        lifecycle.stop();
        assert!(lifecycle.begin_stream().is_err());

        lifecycle.initialize();
        let guard = lifecycle.begin_stream().unwrap();
        assert!(!guard.stop_token().is_cancelled());
    }

    #[test]
    fn test_streams_allowed_without_init() {
        let lifecycle = Lifecycle::new();
        let _a = lifecycle.begin_stream().unwrap();
        let _b = lifecycle.begin_stream().unwrap();
        assert_eq!(lifecycle.active_streams(), 2);
    }
}
