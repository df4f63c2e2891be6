//! Single-flight session refresh in front of every API call.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every call issued through `ApiClient` passes through `RefreshCoordinator::execute`.
//! When the server answers 401 the coordinator refreshes the session once and
//! replays the call. Calls that hit 401 while a refresh is already running are
//! parked and replayed (or rejected) when it settles.
//!
//! DESIGN
//! ======
//! The refresh state lives behind a `std::sync::Mutex` that is only held for
//! check-and-set, never across an await. Waiters are `oneshot` senders kept in
//! FIFO order. Every settled refresh bumps an epoch; a call that observed an
//! older epoch replays (or fails) according to the last outcome instead of
//! starting another refresh. The leader holds a lease that settles as a failure
//! if its future is dropped mid-refresh, so waiters are never stranded.
//!
//! ERROR HANDLING
//! ==============
//! Non-401 errors pass through untouched. A refresh that is rejected or times
//! out rejects every waiter with `SessionExpired`, resets the session, cascades
//! the reset to collaborators and redirects to the login route exactly once.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::hooks::{Navigator, SessionHooks};
use crate::state::SessionStore;
use crate::transport::{ApiRequest, ApiResponse, Transport};

pub const REFRESH_ENDPOINT: &str = "/auth/refresh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshOutcome {
    Refreshed,
    Expired,
}

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
    epoch: u64,
    last: Option<RefreshOutcome>,
}

enum Admission {
    Lead,
    Wait(oneshot::Receiver<RefreshOutcome>),
    Settled(RefreshOutcome),
    Rejected(ApiError),
}

pub struct RefreshCoordinator {
    transport: Arc<dyn Transport>,
    session: SessionStore,
    navigator: Arc<dyn Navigator>,
    hooks: Arc<dyn SessionHooks>,
    state: Mutex<RefreshState>,
    max_waiters: usize,
    refresh_timeout: Duration,
    login_route: String,
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        session: SessionStore,
        navigator: Arc<dyn Navigator>,
        hooks: Arc<dyn SessionHooks>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            transport,
            session,
            navigator,
            hooks,
            state: Mutex::new(RefreshState::default()),
            max_waiters: config.max_waiters,
            refresh_timeout: config.timeouts.refresh,
            login_route: config.login_route.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `true` while a refresh request is outstanding.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.lock().in_flight
    }

    /// Number of calls parked on the in-flight refresh.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Run `call`, refreshing the session and replaying it once on 401.
    ///
    /// With `skip_refresh` set a 401 is returned as-is; auth endpoints use this
    /// so a failing refresh or login can never recurse into another refresh.
    ///
    /// # Errors
    ///
    /// Returns the call's own error for anything other than 401,
    /// `SessionExpired` when the refresh fails, and `RefreshBacklogFull` when
    /// too many calls are already waiting.
    pub async fn execute<F, Fut>(&self, call: F, skip_refresh: bool) -> Result<ApiResponse, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<ApiResponse, ApiError>>,
    {
        let observed = self.lock().epoch;
        match call().await {
            Err(e) if e.is_unauthorized() && !skip_refresh => self.recover(observed, &call).await,
            other => other,
        }
    }

    async fn recover<F, Fut>(&self, observed: u64, call: &F) -> Result<ApiResponse, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<ApiResponse, ApiError>>,
    {
        match self.admit(observed) {
            Admission::Settled(RefreshOutcome::Refreshed) => call().await,
            Admission::Settled(RefreshOutcome::Expired) => Err(ApiError::SessionExpired),
            Admission::Rejected(e) => Err(e),
            Admission::Wait(rx) => match rx.await {
                Ok(RefreshOutcome::Refreshed) => call().await,
                Ok(RefreshOutcome::Expired) | Err(_) => Err(ApiError::SessionExpired),
            },
            Admission::Lead => {
                let lease = RefreshLease { state: &self.state, settled: false };
                let refreshed = self.refresh().await;
                let replayed = lease.settle(refreshed);
                if refreshed {
                    tracing::debug!(replayed, "session refreshed");
                    call().await
                } else {
                    self.expire(replayed);
                    Err(ApiError::SessionExpired)
                }
            }
        }
    }

    fn admit(&self, observed: u64) -> Admission {
        let mut state = self.lock();
        if state.in_flight {
            if state.waiters.len() >= self.max_waiters {
                tracing::warn!(limit = self.max_waiters, "refresh backlog full; rejecting call");
                return Admission::Rejected(ApiError::RefreshBacklogFull { limit: self.max_waiters });
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            return Admission::Wait(rx);
        }
        if state.epoch != observed {
            if let Some(outcome) = state.last {
                return Admission::Settled(outcome);
            }
        }
        state.in_flight = true;
        Admission::Lead
    }

    /// Issue the refresh straight on the transport so it can never re-enter `execute`.
    async fn refresh(&self) -> bool {
        let request = ApiRequest::post(REFRESH_ENDPOINT);
        match tokio::time::timeout(self.refresh_timeout, self.transport.send(&request)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "session refresh rejected");
                false
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.refresh_timeout, "session refresh timed out");
                false
            }
        }
    }

    fn expire(&self, rejected: usize) {
        tracing::info!(rejected, "session expired; redirecting to sign-in");
        self.session.expire(ApiError::SessionExpired.to_string());
        self.hooks.reset_tenant();
        self.hooks.reset_catalog();
        self.navigator.redirect(&self.login_route);
    }
}

/// Ownership of the in-flight refresh. Dropping it unsettled fails the waiters.
struct RefreshLease<'a> {
    state: &'a Mutex<RefreshState>,
    settled: bool,
}

impl RefreshLease<'_> {
    /// Publish the outcome to every waiter in arrival order. Returns how many were notified.
    fn settle(mut self, refreshed: bool) -> usize {
        self.settled = true;
        let outcome = if refreshed { RefreshOutcome::Refreshed } else { RefreshOutcome::Expired };
        settle(self.state, outcome)
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            settle(self.state, RefreshOutcome::Expired);
        }
    }
}

fn settle(state: &Mutex<RefreshState>, outcome: RefreshOutcome) -> usize {
    let waiters = {
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        state.in_flight = false;
        state.epoch += 1;
        state.last = Some(outcome);
        std::mem::take(&mut state.waiters)
    };
    let count = waiters.len();
    for waiter in waiters {
        // A waiter whose caller went away has nothing left to replay.
        let _ = waiter.send(outcome);
    }
    count
}

#[cfg(test)]
#[path = "refresh_test.rs"]
mod tests;
