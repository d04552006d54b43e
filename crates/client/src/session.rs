//! Endpoint resolution and degraded-mode session.
//!
//! One `EndpointSession` is shared (as `Arc<EndpointSession>`) by every
//! screen that reads or writes remote collections, so all of them agree on
//! which base URL is active and whether the app is offline.
//!
//! State transitions:
//!
//! ```text
//! Unresolved --probe ok--------------------> Online(url)
//! Unresolved --probe exhausted-------------> Offline
//! Online(url) --call fails, re-probe ok----> Online(new_url)
//! Online(url) --call fails, re-probe fails-> Offline
//! Offline    --go_online------------------> Unresolved -> probe
//! any        --go_offline-----------------> Offline
//! ```
//!
//! `go_offline` wins over a cycle that is still probing: the cycle's result
//! is dropped and reported as [`Resolution::Superseded`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{Mutex, watch};

use storefront_core::{Draft, EntityId, FieldErrors, Resource};

use crate::config::SessionConfig;
use crate::offline::SessionState;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Transport, TransportError};
use crate::types::{
    CreateOutcome, DataSource, DeleteOutcome, FailureReason, Fetched, PendingLocal, Persistence,
    Resolution,
};

pub struct EndpointSession {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    state: watch::Sender<SessionState>,
    /// Held for the whole of a resolution cycle; holds the last finished one.
    resolve_lock: Mutex<Option<Cycle>>,
    /// Number of finished resolution cycles.
    cycles: AtomicU64,
    /// Bumped by every `go_offline`; a cycle only commits within its epoch.
    epoch: AtomicU64,
    closed: AtomicBool,
}

/// What a cycle does when every candidate fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnExhausted {
    GoOffline,
    /// Leave the state alone; used by the create retry, where going offline
    /// is the caller's decision.
    Report,
}

struct Cycle {
    resolution: Resolution,
    on_exhausted: OnExhausted,
}

impl Cycle {
    /// Whether a caller that queued behind this cycle may take its result.
    fn shareable_with(&self, wanted: OnExhausted) -> bool {
        match self.resolution {
            Resolution::Superseded => false,
            Resolution::Exhausted => self.on_exhausted == wanted || wanted == OnExhausted::Report,
            _ => true,
        }
    }
}

/// Outcome of a single POST attempt.
enum PostError {
    Rejected(FieldErrors),
    Failed(FailureReason),
}

#[derive(Deserialize)]
struct ValidationBody {
    errors: FieldErrors,
}

impl EndpointSession {
    pub fn new(config: SessionConfig, transport: Arc<dyn Transport>) -> Self {
        let (state, _) = watch::channel(SessionState::Unresolved);
        Self {
            config,
            transport,
            state,
            resolve_lock: Mutex::new(None),
            cycles: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Session over the real HTTP transport.
    pub fn http(config: SessionConfig) -> Self {
        Self::new(config, Arc::new(HttpTransport::new()))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Observe state changes (read-only).
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_offline(&self) -> bool {
        self.state.borrow().is_offline()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Tear the session down. A resolution cycle still running will finish
    /// its current request but will not touch the state afterwards.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        tracing::debug!("session closed");
    }

    // ---- resolution ---------------------------------------------------

    /// Make sure an endpoint is active.
    ///
    /// Returns the active endpoint without any request when already online.
    /// Otherwise probes the candidates in order; a caller arriving while a
    /// cycle is in flight waits for it and shares its result.
    pub async fn resolve(&self) -> Resolution {
        if let SessionState::Online(url) = self.state() {
            return Resolution::Resolved(url);
        }
        self.resolve_single_flight(OnExhausted::GoOffline).await
    }

    /// Probe all candidates again, even when online (manual connection test).
    pub async fn test_connection(&self) -> Resolution {
        self.resolve_single_flight(OnExhausted::GoOffline).await
    }

    /// User switched to offline mode: serve sample data, keep writes local.
    /// A resolution cycle still running will not override this.
    pub fn go_offline(&self) {
        if self.is_closed() {
            return;
        }
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.state.send_replace(SessionState::Offline);
        tracing::info!("switched to offline mode");
    }

    /// User asked to go back online: forget the offline decision and probe.
    pub async fn go_online(&self) -> Resolution {
        if self.is_offline() {
            self.set_state(SessionState::Unresolved);
        }
        self.resolve().await
    }

    async fn resolve_single_flight(&self, on_exhausted: OnExhausted) -> Resolution {
        let seen = self.cycles.load(Ordering::Acquire);
        let mut last = self.resolve_lock.lock().await;

        if self.cycles.load(Ordering::Acquire) != seen {
            // Another cycle finished while we waited for the lock.
            if let Some(cycle) = last.as_ref().filter(|c| c.shareable_with(on_exhausted)) {
                return cycle.resolution.clone();
            }
        }

        let resolution = self.run_cycle(on_exhausted).await;
        *last = Some(Cycle { resolution: resolution.clone(), on_exhausted });
        self.cycles.fetch_add(1, Ordering::AcqRel);
        resolution
    }

    async fn run_cycle(&self, on_exhausted: OnExhausted) -> Resolution {
        let epoch = self.epoch.load(Ordering::Acquire);
        let resource = self.config.probe_resource();

        for (attempt, base) in self.config.candidates().iter().enumerate() {
            if let Err(dropped) = self.check_cycle(epoch) {
                return dropped;
            }

            let url = collection_url(base, resource);
            tracing::debug!(attempt = attempt + 1, url = %url, "probing endpoint");

            match self.call(HttpRequest::get(url), self.config.probe_timeout()).await {
                Ok(resp) if resp.is_success() => {
                    if let Err(dropped) = self.commit_cycle(epoch, SessionState::Online(base.clone())) {
                        return dropped;
                    }
                    tracing::info!(url = %base, "endpoint resolved");
                    return Resolution::Resolved(base.clone());
                }
                Ok(resp) => {
                    tracing::debug!(url = %base, status = resp.status, "probe rejected");
                }
                Err(err) => {
                    tracing::debug!(url = %base, error = %err, "probe failed");
                }
            }
        }

        match on_exhausted {
            OnExhausted::GoOffline => {
                if let Err(dropped) = self.commit_cycle(epoch, SessionState::Offline) {
                    return dropped;
                }
                tracing::warn!(
                    candidates = self.config.candidates().len(),
                    "all endpoints failed, switching to offline mode"
                );
            }
            OnExhausted::Report => {
                if let Err(dropped) = self.check_cycle(epoch) {
                    return dropped;
                }
                tracing::warn!(candidates = self.config.candidates().len(), "all endpoints failed");
            }
        }
        Resolution::Exhausted
    }

    /// `Err` with the reported resolution when the cycle must stop.
    fn check_cycle(&self, epoch: u64) -> Result<(), Resolution> {
        if self.is_closed() {
            return Err(Resolution::Cancelled);
        }
        if self.epoch.load(Ordering::Acquire) != epoch {
            return Err(Resolution::Superseded);
        }
        Ok(())
    }

    /// Write a cycle's state unless the session was closed or switched
    /// offline since the cycle started. Checked under the channel's lock.
    fn commit_cycle(&self, epoch: u64, next: SessionState) -> Result<(), Resolution> {
        let mut committed = Err(Resolution::Cancelled);
        self.state.send_if_modified(|state| {
            committed = self.check_cycle(epoch);
            if committed.is_ok() {
                *state = next;
            }
            committed.is_ok()
        });
        committed
    }

    /// Endpoint to use for a call, resolving lazily when unresolved.
    /// `None` means the call should be served offline.
    async fn current_endpoint(&self) -> Result<Option<String>, FailureReason> {
        match self.state() {
            SessionState::Online(url) => Ok(Some(url)),
            SessionState::Offline => Ok(None),
            SessionState::Unresolved => match self.resolve().await {
                Resolution::Resolved(url) => Ok(Some(url)),
                Resolution::Exhausted | Resolution::Superseded => Ok(None),
                Resolution::Cancelled => Err(FailureReason::Closed),
            },
        }
    }

    // ---- reads --------------------------------------------------------

    /// List a collection.
    ///
    /// Offline sessions get the sample set without any request. A failed
    /// GET triggers one re-probe of all candidates before falling back to
    /// samples; the returned [`DataSource`] says which happened.
    pub async fn fetch_collection<R: Resource>(&self) -> Fetched<R::Entity> {
        let base = match self.current_endpoint().await {
            Ok(Some(base)) => base,
            Ok(None) => return sample_set::<R>(DataSource::Offline),
            Err(reason) => return sample_set::<R>(DataSource::Degraded(reason)),
        };

        let reason = match self.get_collection::<R>(&base).await {
            Ok(items) => return remote_set(items, base),
            Err(reason) => reason,
        };

        tracing::warn!(resource = R::NAME, url = %base, error = %reason, "fetch failed, re-probing");

        match self.test_connection().await {
            Resolution::Resolved(url) => match self.get_collection::<R>(&url).await {
                Ok(items) => remote_set(items, url),
                Err(reason) => {
                    tracing::warn!(resource = R::NAME, url = %url, error = %reason, "fetch failed after re-probe");
                    sample_set::<R>(DataSource::Degraded(reason))
                }
            },
            Resolution::Exhausted => sample_set::<R>(DataSource::Degraded(FailureReason::Exhausted)),
            Resolution::Superseded => sample_set::<R>(DataSource::Offline),
            Resolution::Cancelled => sample_set::<R>(DataSource::Degraded(FailureReason::Closed)),
        }
    }

    async fn get_collection<R: Resource>(&self, base: &str) -> Result<Vec<R::Entity>, FailureReason> {
        let url = collection_url(base, R::NAME);
        let resp = self
            .call(HttpRequest::get(url), self.config.request_timeout())
            .await?;

        if !resp.is_success() {
            return Err(api_failure(&resp));
        }

        resp.json::<Vec<R::Entity>>()
            .map_err(|e| FailureReason::Decode(e.to_string()))
    }

    // ---- writes -------------------------------------------------------

    /// Create an entity from a caller-built draft.
    ///
    /// The draft is validated before anything else. Offline sessions keep
    /// the entity locally. Online, a failed POST gets exactly one
    /// re-resolution and one retry; if that fails too the caller decides
    /// between [`accept_local`](Self::accept_local) and discarding. The
    /// re-resolution never switches the session offline by itself.
    pub async fn create_entity<R: Resource>(&self, draft: &R::Draft) -> CreateOutcome<R> {
        let payload = match draft.validate() {
            Ok(payload) => payload,
            Err(errors) => return CreateOutcome::ValidationFailure(errors),
        };

        let base = match self.current_endpoint().await {
            Ok(Some(base)) => base,
            Ok(None) => return CreateOutcome::LocalOnlySuccess(local_entity::<R>(&payload)),
            Err(reason) => return remote_failure(reason, payload),
        };

        let reason = match self.post::<R>(&base, &payload).await {
            Ok(entity) => return CreateOutcome::RemoteSuccess(entity),
            Err(PostError::Rejected(errors)) => return CreateOutcome::ServerValidationFailure(errors),
            Err(PostError::Failed(reason)) => reason,
        };

        tracing::warn!(resource = R::NAME, url = %base, error = %reason, "create failed, re-probing once");

        match self.resolve_single_flight(OnExhausted::Report).await {
            Resolution::Resolved(url) => match self.post::<R>(&url, &payload).await {
                Ok(entity) => CreateOutcome::RemoteSuccess(entity),
                Err(PostError::Rejected(errors)) => CreateOutcome::ServerValidationFailure(errors),
                Err(PostError::Failed(reason)) => remote_failure(reason, payload),
            },
            Resolution::Exhausted | Resolution::Superseded => remote_failure(reason, payload),
            Resolution::Cancelled => remote_failure(FailureReason::Closed, payload),
        }
    }

    /// Keep a failed create on this device only. The session goes offline,
    /// so later writes stay local too until the user goes back online.
    pub fn accept_local<R: Resource>(&self, pending: PendingLocal<R>) -> CreateOutcome<R> {
        self.go_offline();
        CreateOutcome::LocalOnlySuccess(local_entity::<R>(&pending.payload))
    }

    async fn post<R: Resource>(
        &self,
        base: &str,
        payload: &<R::Draft as Draft>::Payload,
    ) -> Result<R::Entity, PostError> {
        let body = serde_json::to_value(payload)
            .map_err(|e| PostError::Failed(FailureReason::Encode(e.to_string())))?;
        let url = collection_url(base, R::NAME);

        let resp = self
            .call(HttpRequest::post(url, body), self.config.request_timeout())
            .await
            .map_err(|e| PostError::Failed(e.into()))?;

        if !resp.is_success() {
            if let Ok(ValidationBody { errors }) = resp.json::<ValidationBody>() {
                tracing::info!(resource = R::NAME, fields = errors.len(), "server rejected payload");
                return Err(PostError::Rejected(errors));
            }
            return Err(PostError::Failed(api_failure(&resp)));
        }

        Ok(created_entity::<R>(&resp, payload))
    }

    /// Delete an entity previously observed in a collection.
    ///
    /// Offline (and for local-only ids) this only reports local removal.
    /// Online, a failed DELETE is reported and never downgraded to a local
    /// removal, so the caller must keep showing the entity.
    pub async fn delete_entity<R: Resource>(&self, id: &EntityId) -> DeleteOutcome {
        if id.is_local() {
            return DeleteOutcome::Removed(Persistence::LocalOnly);
        }

        let base = match self.current_endpoint().await {
            Ok(Some(base)) => base,
            Ok(None) => return DeleteOutcome::Removed(Persistence::LocalOnly),
            Err(reason) => return DeleteOutcome::RemoteFailure(reason),
        };

        let url = format!("{}/{}", collection_url(&base, R::NAME), id);
        match self.call(HttpRequest::delete(url), self.config.request_timeout()).await {
            Ok(resp) if resp.is_success() => DeleteOutcome::Removed(Persistence::Remote),
            Ok(resp) => {
                let reason = api_failure(&resp);
                tracing::warn!(resource = R::NAME, id = %id, error = %reason, "delete rejected");
                DeleteOutcome::RemoteFailure(reason)
            }
            Err(err) => {
                tracing::warn!(resource = R::NAME, id = %id, error = %err, "delete failed");
                DeleteOutcome::RemoteFailure(err.into())
            }
        }
    }

    // ---- plumbing -----------------------------------------------------

    /// Every request is bounded here as well as in the transport.
    async fn call(&self, request: HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError> {
        match tokio::time::timeout(timeout, self.transport.send(&request, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }

    /// Returns false (and changes nothing) once the session is closed.
    fn set_state(&self, next: SessionState) -> bool {
        if self.is_closed() {
            return false;
        }
        self.state.send_replace(next);
        true
    }
}

impl core::fmt::Debug for EndpointSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EndpointSession")
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

fn collection_url(base: &str, resource: &str) -> String {
    format!("{}/{}", base, resource)
}

fn api_failure(resp: &HttpResponse) -> FailureReason {
    FailureReason::Api { status: resp.status, body: resp.text() }
}

fn sample_set<R: Resource>(source: DataSource) -> Fetched<R::Entity> {
    Fetched { items: R::samples(), source }
}

fn remote_set<E>(items: Vec<E>, endpoint: String) -> Fetched<E> {
    Fetched { items, source: DataSource::Remote { endpoint } }
}

fn local_entity<R: Resource>(payload: &<R::Draft as Draft>::Payload) -> R::Entity {
    R::local_entity(EntityId::local(), payload)
}

fn remote_failure<R: Resource>(
    reason: FailureReason,
    payload: <R::Draft as Draft>::Payload,
) -> CreateOutcome<R> {
    CreateOutcome::RemoteFailure { reason, pending: PendingLocal { payload } }
}

/// Decode the created entity from a 2xx POST response.
///
/// Accepts the entity itself or a `{"data": entity}` envelope. When the body
/// is neither, the server did persist the entity, so it is rebuilt from the
/// payload with the server id if one was returned.
fn created_entity<R: Resource>(resp: &HttpResponse, payload: &<R::Draft as Draft>::Payload) -> R::Entity {
    if let Ok(entity) = resp.json::<R::Entity>() {
        return entity;
    }

    let body: Value = resp.json().unwrap_or(Value::Null);
    if let Some(entity) = body
        .get("data")
        .and_then(|data| serde_json::from_value::<R::Entity>(data.clone()).ok())
    {
        return entity;
    }

    let id = body
        .get("id")
        .or_else(|| body.pointer("/data/id"))
        .and_then(|id| serde_json::from_value::<EntityId>(id.clone()).ok());

    tracing::warn!(resource = R::NAME, has_id = id.is_some(), "unrecognized create response body");
    R::local_entity(id.unwrap_or_else(EntityId::local), payload)
}

#[cfg(test)]
mod tests;
