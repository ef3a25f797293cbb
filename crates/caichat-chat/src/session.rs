use futures::FutureExt;
use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

use caichat_api::UpstreamClient;
use caichat_types::{Credentials, Identity, RelayError};

use crate::RelayResult;

/// Lifecycle owner of the one upstream connection.
///
/// The client handle is injected; collaborators obtain it through
/// [`SessionManager::client`] once the session is open.
pub struct SessionManager {
    client: Arc<dyn UpstreamClient>,
    identity: OnceLock<Identity>,
    closed: AtomicBool,
}

impl SessionManager {
    pub fn new(client: Arc<dyn UpstreamClient>) -> Self {
        Self {
            client,
            identity: OnceLock::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Authenticate and cache the account identity.
    ///
    /// Any failure is reported as [`RelayError::Auth`]; callers treat it as
    /// fatal. Opening an already-open session returns the cached identity.
    pub async fn open(&self, credentials: &Credentials) -> RelayResult<Identity> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RelayError::SessionClosed);
        }
        if let Some(identity) = self.identity.get() {
            warn!(username = %identity.username, "session already open, reusing identity");
            return Ok(identity.clone());
        }

        let identity = self
            .client
            .open(credentials)
            .await
            .map_err(|e| RelayError::Auth(e.to_string()))?;

        // A concurrent open may have won the race; keep the first identity
        let identity = self.identity.get_or_init(|| identity).clone();
        info!(username = %identity.username, "authenticated with upstream");
        Ok(identity)
    }

    pub fn identity(&self) -> RelayResult<Identity> {
        self.identity
            .get()
            .cloned()
            .ok_or(RelayError::NotAuthenticated)
    }

    pub fn is_open(&self) -> bool {
        self.identity.get().is_some() && !self.closed.load(Ordering::SeqCst)
    }

    /// The shared upstream handle, for the orchestrator and directory
    pub fn client(&self) -> RelayResult<Arc<dyn UpstreamClient>> {
        if self.identity.get().is_none() {
            return Err(RelayError::NotAuthenticated);
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(RelayError::SessionClosed);
        }
        Ok(Arc::clone(&self.client))
    }

    /// Release the upstream connection. Only the first call does anything.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.client.close().await {
            Ok(()) => info!("upstream session closed"),
            Err(e) => warn!(error = %e, "closing upstream session failed"),
        }
    }

    /// Open, run `body`, and close on every exit path.
    ///
    /// A panic inside `body` is re-raised after the session is closed.
    pub async fn run_scoped<F, Fut, T>(&self, credentials: &Credentials, body: F) -> RelayResult<T>
    where
        F: FnOnce(Identity) -> Fut,
        Fut: Future<Output = T>,
    {
        let identity = match self.open(credentials).await {
            Ok(identity) => identity,
            Err(e) => {
                self.close().await;
                return Err(e);
            }
        };

        let outcome = AssertUnwindSafe(async move { body(identity).await })
            .catch_unwind()
            .await;
        self.close().await;

        match outcome {
            Ok(value) => Ok(value),
            Err(panic) => resume_unwind(panic),
        }
    }
}
