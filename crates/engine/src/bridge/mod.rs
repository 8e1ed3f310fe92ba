//! Cancellable backend fetches feeding tab-local state.
//!
//! Every bridge wraps a [`RemoteResource`]: a `watch` channel holding the
//! current [`FetchState`] plus the cancellation token of the fetch in flight.
//! A fetch publishes its outcome only if its token is still live, and the
//! token is checked while holding the channel's write lock. Cancelling takes
//! the same lock, so once [`RemoteResource::teardown`] returns no outcome of
//! an earlier fetch can reach subscribers.

mod job;
mod lookups;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::BridgeError;

pub use job::{JobBridge, JobStatusBridge, StructureBridge, convert_structure, to_canonical};
pub use lookups::{CodeCatalog, XpsSupportBridge};

/// Presentation state of one remote value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum FetchState<T> {
    /// Nothing requested: the upstream dependency is absent.
    #[default]
    Idle,
    Loading,
    Ready(T),
    Failed(BridgeError),
}

impl<T> FetchState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            FetchState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&BridgeError> {
        match self {
            FetchState::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchState<U> {
        match self {
            FetchState::Idle => FetchState::Idle,
            FetchState::Loading => FetchState::Loading,
            FetchState::Ready(value) => FetchState::Ready(f(value)),
            FetchState::Failed(error) => FetchState::Failed(error),
        }
    }
}

/// A remote value fetched at most once per request, with cancellation.
#[derive(Debug)]
pub struct RemoteResource<T> {
    label: &'static str,
    timeout: Duration,
    state: Arc<watch::Sender<FetchState<T>>>,
    active: Option<CancellationToken>,
}

impl<T> RemoteResource<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(label: &'static str, timeout: Duration) -> Self {
        let (state, _) = watch::channel(FetchState::Idle);
        Self {
            label,
            timeout,
            state: Arc::new(state),
            active: None,
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> FetchState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.state.subscribe()
    }

    /// Cancels any fetch in flight and returns to [`FetchState::Idle`].
    pub fn reset(&mut self) {
        self.cancel_outstanding();
        self.state.send_if_modified(|state| {
            if matches!(state, FetchState::Idle) {
                return false;
            }
            *state = FetchState::Idle;
            true
        });
    }

    /// Cancels any fetch in flight and leaves the state untouched.
    pub fn teardown(&mut self) {
        if self.active.is_some() {
            debug!(resource = self.label, "tearing down outstanding fetch");
        }
        self.cancel_outstanding();
    }

    /// Starts a fetch, superseding any earlier one.
    ///
    /// The state moves to [`FetchState::Loading`] immediately. Outside a Tokio
    /// runtime the fetch cannot run and the state becomes
    /// [`FetchState::Failed`].
    pub fn start<F>(&mut self, fetch: F)
    where
        F: Future<Output = Result<T, BridgeError>> + Send + 'static,
    {
        self.cancel_outstanding();
        self.state.send_replace(FetchState::Loading);

        let Ok(handle) = Handle::try_current() else {
            warn!(resource = self.label, "no async runtime available for fetch");
            self.state
                .send_replace(FetchState::Failed(BridgeError::unavailable("no async runtime available")));
            return;
        };

        let token = CancellationToken::new();
        self.active = Some(token.clone());

        let state = Arc::clone(&self.state);
        let label = self.label;
        let timeout = self.timeout;
        debug!(resource = label, "fetch started");

        handle.spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                result = time::timeout(timeout, fetch) => match result {
                    Ok(outcome) => outcome,
                    Err(_) => Err(BridgeError::timed_out(label, timeout)),
                },
            };
            publish(&state, &token, label, outcome);
        });
    }

    fn cancel_outstanding(&mut self) {
        if let Some(token) = self.active.take() {
            self.state.send_if_modified(|_| {
                token.cancel();
                false
            });
        }
    }
}

impl<T> Drop for RemoteResource<T> {
    fn drop(&mut self) {
        if let Some(token) = self.active.take() {
            token.cancel();
        }
    }
}

fn publish<T>(
    state: &watch::Sender<FetchState<T>>,
    token: &CancellationToken,
    label: &'static str,
    outcome: Result<T, BridgeError>,
) {
    let published = state.send_if_modified(|current| {
        if token.is_cancelled() {
            return false;
        }
        *current = match outcome {
            Ok(value) => FetchState::Ready(value),
            Err(error) => {
                warn!(resource = label, %error, "fetch failed");
                FetchState::Failed(error)
            }
        };
        true
    });

    if !published {
        debug!(resource = label, "discarded outcome of cancelled fetch");
    }
}
