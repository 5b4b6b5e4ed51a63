pub mod ports;
pub mod provider;
pub mod store;

pub use ports::*;
pub use provider::{MicrosoftIdentityClient, DEFAULT_SCOPES};
pub use store::FileUserStore;

use crate::common::{NoticeKind, Notifier, RequestMetadata};
use crate::config_store::IdentityProviderConfig;
use chrono::Utc;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

const EVENT_CHANNEL_CAPACITY: usize = 16;
/// Idle poll while no user is loaded, and backoff between renewal attempts
const RENEW_IDLE_TICK: Duration = Duration::from_secs(30);
const RENEW_RETRY_BACKOFF: Duration = Duration::from_secs(5);

struct SessionInner {
    state: RwLock<SessionSnapshot>,
    client: Option<Arc<dyn IdentityClient>>,
    user_store: Arc<dyn UserStore>,
    enrichment: Arc<dyn EnrichmentTrigger>,
    notifier: Arc<dyn Notifier>,
    metadata: RequestMetadata,
    events: broadcast::Sender<SessionEvent>,
    renew_lead: chrono::Duration,
}

impl SessionInner {
    /// Single entry point for session-state transitions. Every mutation
    /// goes through here so observers see the same typed stream the
    /// manager itself acts on.
    fn apply_event(&self, event: SessionEvent) {
        match &event {
            SessionEvent::UserLoaded(user) => {
                {
                    let mut state = self.state.write().unwrap();
                    state.user = Some(user.clone());
                    state.is_loading = false;
                    state.phase = SessionPhase::Ready;
                }
                // Fire-and-forget; pipeline failures never reach session
                // state.
                self.enrichment.trigger(user, &self.metadata);
            }
            SessionEvent::UserUnloaded => {
                let mut state = self.state.write().unwrap();
                state.user = None;
                state.is_loading = false;
                state.phase = SessionPhase::Ready;
            }
            SessionEvent::SilentRenewError(message) => {
                // The stale user is retained; it stays usable until its own
                // expiry.
                let mut state = self.state.write().unwrap();
                state.error = Some(message.clone());
                state.phase = SessionPhase::Error;
            }
        }

        let _ = self.events.send(event);
    }

    fn record_error(&self, message: String) {
        let mut state = self.state.write().unwrap();
        state.error = Some(message);
        state.phase = SessionPhase::Error;
    }

    fn finish_loading(&self) {
        let mut state = self.state.write().unwrap();
        state.is_loading = false;
        if state.phase == SessionPhase::Constructing {
            state.phase = SessionPhase::Ready;
        }
    }

    async fn attempt_silent_renew(&self) {
        let Some(client) = self.client.as_ref() else {
            return;
        };
        let Some(user) = self.state.read().unwrap().user.clone() else {
            return;
        };
        if user.refresh_token.is_none() {
            debug!("No refresh token, skipping silent renewal");
            return;
        }

        match client.refresh(&user).await {
            Ok(renewed) => {
                if let Err(e) = self.user_store.save(&renewed).await {
                    warn!(error = %e, "Failed to persist renewed user");
                }
                info!(subject = %renewed.subject, "Silent renewal succeeded");
                self.apply_event(SessionEvent::UserLoaded(renewed));
            }
            Err(e) => {
                warn!(error = %e, "Silent renewal failed");
                self.apply_event(SessionEvent::SilentRenewError(e.to_string()));
            }
        }
    }
}

/// Owns the identity-provider client lifecycle: construction from resolved
/// config, sign-in/sign-out redirects, silent renewal and the session event
/// stream. Constructed explicitly and handed to consumers; dropped (or
/// `shutdown()`) before a reconfigured replacement is built.
pub struct SessionManager {
    inner: Arc<SessionInner>,
    renew_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// Build a manager from resolved identity-provider config. Incomplete
    /// config (empty client id or tenant) is a valid quiescent state: the
    /// manager settles into `Ready(None)` without constructing a client or
    /// touching the network.
    pub fn from_config(
        config: &IdentityProviderConfig,
        origin: &str,
        user_store: Arc<dyn UserStore>,
        enrichment: Arc<dyn EnrichmentTrigger>,
        notifier: Arc<dyn Notifier>,
        metadata: RequestMetadata,
        renew_lead: Duration,
    ) -> Result<Self, SessionError> {
        if !config.is_complete() {
            debug!("Identity config incomplete, session construction skipped");
            return Ok(Self::with_client(
                None, user_store, enrichment, notifier, metadata, renew_lead,
            ));
        }

        let client: Arc<dyn IdentityClient> =
            Arc::new(MicrosoftIdentityClient::new(config, origin)?);
        Ok(Self::with_client(
            Some(client),
            user_store,
            enrichment,
            notifier,
            metadata,
            renew_lead,
        ))
    }

    /// Build a manager around an already-constructed client (or none)
    pub fn with_client(
        client: Option<Arc<dyn IdentityClient>>,
        user_store: Arc<dyn UserStore>,
        enrichment: Arc<dyn EnrichmentTrigger>,
        notifier: Arc<dyn Notifier>,
        metadata: RequestMetadata,
        renew_lead: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let snapshot = if client.is_some() {
            SessionSnapshot {
                phase: SessionPhase::Constructing,
                user: None,
                error: None,
                is_loading: true,
            }
        } else {
            SessionSnapshot {
                phase: SessionPhase::Ready,
                user: None,
                error: None,
                is_loading: false,
            }
        };

        Self {
            inner: Arc::new(SessionInner {
                state: RwLock::new(snapshot),
                client,
                user_store,
                enrichment,
                notifier,
                metadata,
                events,
                renew_lead: chrono::Duration::seconds(renew_lead.as_secs() as i64),
            }),
            renew_task: Mutex::new(None),
        }
    }

    /// Query the user store for an already-persisted user (restart
    /// continuity) and start the silent-renewal timer. A found user
    /// re-triggers enrichment.
    pub async fn start(&self) {
        if self.inner.client.is_none() {
            return;
        }

        match self.inner.user_store.load().await {
            Ok(Some(user)) => {
                debug!(subject = %user.subject, "Rehydrated persisted user");
                self.inner.apply_event(SessionEvent::UserLoaded(user));
            }
            Ok(None) => self.inner.finish_loading(),
            Err(e) => {
                warn!(error = %e, "Failed to read persisted user");
                self.inner.record_error(e.to_string());
                self.inner.finish_loading();
            }
        }

        self.spawn_renew_task();
    }

    /// Subscribe to the session event stream. Dropping the receiver
    /// detaches the subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.read().unwrap().clone()
    }

    /// User present and not past its own expiry
    pub fn is_authenticated(&self) -> bool {
        self.inner
            .state
            .read()
            .unwrap()
            .user
            .as_ref()
            .is_some_and(|user| !user.expired())
    }

    /// Build the sign-in redirect. Failure is recorded on session state and
    /// notified, never propagated as a panic.
    pub fn login(&self) -> Option<Url> {
        let Some(client) = self.inner.client.as_ref() else {
            self.inner
                .record_error(SessionError::ClientNotConstructed.to_string());
            self.inner.notifier.notify(
                NoticeKind::Error,
                "Sign-in unavailable",
                "The identity provider is not configured.",
            );
            return None;
        };

        match client.signin_redirect() {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, "Sign-in redirect failed");
                self.inner.record_error(e.to_string());
                self.inner.notifier.notify(
                    NoticeKind::Error,
                    "Sign-in failed",
                    "Could not start the sign-in flow. Please try again.",
                );
                None
            }
        }
    }

    /// Build the sign-out redirect, clearing the persisted user. Same
    /// error contract as `login`.
    pub async fn logout(&self) -> Option<Url> {
        let Some(client) = self.inner.client.as_ref() else {
            self.inner
                .record_error(SessionError::ClientNotConstructed.to_string());
            self.inner.notifier.notify(
                NoticeKind::Error,
                "Sign-out unavailable",
                "The identity provider is not configured.",
            );
            return None;
        };

        match client.signout_redirect() {
            Ok(url) => {
                if let Err(e) = self.inner.user_store.clear().await {
                    warn!(error = %e, "Failed to clear persisted user");
                }
                self.inner.apply_event(SessionEvent::UserUnloaded);
                Some(url)
            }
            Err(e) => {
                warn!(error = %e, "Sign-out redirect failed");
                self.inner.record_error(e.to_string());
                self.inner.notifier.notify(
                    NoticeKind::Error,
                    "Sign-out failed",
                    "Could not start the sign-out flow. Please try again.",
                );
                None
            }
        }
    }

    /// Complete the code-redirect round trip. On success the user is
    /// persisted and `UserLoaded` fires (which triggers enrichment).
    pub async fn handle_callback(&self, code: &str) -> Result<(), SessionError> {
        let Some(client) = self.inner.client.as_ref() else {
            return Err(SessionError::ClientNotConstructed);
        };

        match client.exchange_code(code).await {
            Ok(user) => {
                if let Err(e) = self.inner.user_store.save(&user).await {
                    warn!(error = %e, "Failed to persist signed-in user");
                }
                info!(subject = %user.subject, "User signed in");
                self.inner.apply_event(SessionEvent::UserLoaded(user));
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Authorization-code exchange failed");
                self.inner.record_error(e.to_string());
                self.inner.notifier.notify(
                    NoticeKind::Error,
                    "Sign-in failed",
                    "The identity provider rejected the sign-in. Please try again.",
                );
                Err(e)
            }
        }
    }

    fn spawn_renew_task(&self) {
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            loop {
                let deadline = inner
                    .state
                    .read()
                    .unwrap()
                    .user
                    .as_ref()
                    .map(|user| user.expires_at);

                match deadline {
                    None => tokio::time::sleep(RENEW_IDLE_TICK).await,
                    Some(expires_at) => {
                        let until = (expires_at - Utc::now() - inner.renew_lead)
                            .to_std()
                            .unwrap_or(Duration::ZERO);
                        if !until.is_zero() {
                            tokio::time::sleep(until).await;
                        }
                        inner.attempt_silent_renew().await;
                        tokio::time::sleep(RENEW_RETRY_BACKOFF).await;
                    }
                }
            }
        });

        let mut slot = self.renew_task.lock().unwrap();
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    /// Detach the renewal timer. New events stop; in-flight enrichment
    /// writes are allowed to complete (they target durable storage only).
    pub fn shutdown(&self) {
        if let Some(handle) = self.renew_task.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
