//! crates/doc_chat_core/src/session.rs
//!
//! The session context: the three-phase workflow gate, the busy flag, and the
//! two-phase lifecycle of Upload and Ask requests.
//!
//! All state lives in one `SessionState` behind a mutex. The lock is only held
//! for a transition, never across a network call, so a second submission made
//! while a request is outstanding observes `busy` and is refused.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::conversation::ConversationLog;
use crate::domain::{
    Answer, BearerToken, Credentials, Identity, Phase, SessionId, StatusMessage, Turn,
};
use crate::gateway::{self, RequestGateway, RequestOutcome, Rejection};
use crate::ports::{DocumentBackend, IdentityProvider};

/// System turn appended once a document is ready for questions.
pub const DOCUMENT_READY_TEXT: &str =
    "PDF uploaded and processed successfully. You can now ask questions about the content!";
const UPLOADING_STATUS: &str = "Uploading file...";
const UPLOADED_STATUS: &str = "PDF uploaded and processed. You can now ask questions!";
const EVENT_CAPACITY: usize = 256;

//=========================================================================================
// Configuration and Events
//=========================================================================================

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound for every backend and token call. `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Accepted document extensions, without the leading dot.
    pub document_extensions: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(120)),
            document_extensions: vec!["pdf".to_string()],
        }
    }
}

/// Notifications for the front end, in the order the transitions happened.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseChanged(Phase),
    BusyChanged(bool),
    TurnAppended(Turn),
    StatusChanged(StatusMessage),
    LogCleared,
    /// An Ask settled; the latest turn should be brought into view.
    ScrollToLatest,
}

//=========================================================================================
// SessionState
//=========================================================================================

/// Everything the session knows. Cloned out through [`Session::snapshot`].
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    credentials: Option<Credentials>,
    session_id: Option<SessionId>,
    log: ConversationLog,
    busy: bool,
    status: Option<StatusMessage>,
    /// Bumped whenever the signed-in user or their document goes away, so that
    /// late responses addressed to the old session are dropped.
    generation: u64,
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        match (&self.credentials, &self.session_id) {
            (None, _) => Phase::Anonymous,
            (Some(_), None) => Phase::Authenticated,
            (Some(_), Some(_)) => Phase::DocumentReady,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.credentials.as_ref().map(|c| &c.identity)
    }

    pub fn token(&self) -> Option<&BearerToken> {
        self.credentials.as_ref().map(|c| &c.token)
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    fn set_busy(&mut self, busy: bool, events: &mut Vec<SessionEvent>) {
        if self.busy != busy {
            self.busy = busy;
            events.push(SessionEvent::BusyChanged(busy));
        }
    }

    pub(crate) fn set_status(&mut self, status: StatusMessage, events: &mut Vec<SessionEvent>) {
        events.push(SessionEvent::StatusChanged(status.clone()));
        self.status = Some(status);
    }

    fn append(&mut self, turn: Turn, events: &mut Vec<SessionEvent>) {
        let appended = self.log.append(turn);
        events.push(SessionEvent::TurnAppended(appended.clone()));
    }

    fn clear_log(&mut self, events: &mut Vec<SessionEvent>) {
        if !self.log.is_empty() {
            self.log.clear();
            events.push(SessionEvent::LogCleared);
        }
    }

    /// Installs fresh credentials. A different user loses the previous document.
    pub(crate) fn install_credentials(
        &mut self,
        credentials: Credentials,
        events: &mut Vec<SessionEvent>,
    ) {
        let same_user = self
            .identity()
            .map(|current| current.uid == credentials.identity.uid)
            .unwrap_or(false);
        if !same_user {
            self.end_document(events);
        }
        self.credentials = Some(credentials);
    }

    /// Drops identity, token, document and transcript in one step.
    pub(crate) fn sign_out(&mut self, events: &mut Vec<SessionEvent>) {
        self.credentials = None;
        self.end_document(events);
    }

    fn end_document(&mut self, events: &mut Vec<SessionEvent>) {
        self.session_id = None;
        self.clear_log(events);
        self.set_busy(false, events);
        self.generation += 1;
    }

    /// Guard for Upload. `Busy` is checked first so a refused double submit changes nothing.
    fn check_upload(&self) -> Result<&BearerToken, Rejection> {
        if self.busy {
            return Err(Rejection::Busy);
        }
        let token = self.token().ok_or(Rejection::NotAuthenticated)?;
        if self.session_id.is_some() {
            return Err(Rejection::DocumentLoaded);
        }
        Ok(token)
    }

    /// Guard for Ask. The document is checked before the sign-in.
    fn check_ask(&self, question: &str) -> Result<(&BearerToken, &SessionId), Rejection> {
        if self.busy {
            return Err(Rejection::Busy);
        }
        let session_id = self.session_id.as_ref().ok_or(Rejection::NoDocument)?;
        let token = self.token().ok_or(Rejection::NotAuthenticated)?;
        if question.trim().is_empty() {
            return Err(Rejection::BlankQuestion);
        }
        Ok((token, session_id))
    }
}

//=========================================================================================
// Session (the context object owned by the front end)
//=========================================================================================

struct Subscription {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub(crate) struct SessionInner {
    pub(crate) state: Mutex<SessionState>,
    pub(crate) identity: Arc<dyn IdentityProvider>,
    pub(crate) gateway: RequestGateway,
    pub(crate) config: SessionConfig,
    events: broadcast::Sender<SessionEvent>,
    subscription: Mutex<Option<Subscription>>,
}

/// Cheaply cloneable handle to one client session.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

struct PendingUpload {
    token: BearerToken,
    generation: u64,
}

/// The optimistic half of an Ask: the user turn is already in the log.
struct PendingAsk {
    token: BearerToken,
    session_id: SessionId,
    message: String,
    generation: u64,
}

impl Session {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        backend: Arc<dyn DocumentBackend>,
        config: SessionConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let gateway = RequestGateway::new(backend, config.request_timeout);
        Self {
            inner: Arc::new(SessionInner {
                state: Mutex::new(SessionState::default()),
                identity,
                gateway,
                config,
                events,
                subscription: Mutex::new(None),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionState {
        self.inner.state.lock().await.clone()
    }

    pub async fn phase(&self) -> Phase {
        self.inner.state.lock().await.phase()
    }

    /// Applies one transition under the lock and publishes what it produced,
    /// adding a `PhaseChanged` event when the workflow phase moved.
    pub(crate) async fn update<R>(
        &self,
        apply: impl FnOnce(&mut SessionState, &mut Vec<SessionEvent>) -> R,
    ) -> R {
        let mut state = self.inner.state.lock().await;
        let before = state.phase();
        let mut events = Vec::new();
        let result = apply(&mut state, &mut events);
        let after = state.phase();
        if before != after {
            debug!(?before, ?after, "Session phase changed");
            events.push(SessionEvent::PhaseChanged(after));
        }
        for event in events {
            // No receivers is fine: nobody is rendering yet.
            let _ = self.inner.events.send(event);
        }
        result
    }

    /// Records a local refusal as a status line. `Busy` stays silent.
    pub(crate) async fn reject<T>(&self, rejection: Rejection) -> Result<T, Rejection> {
        if rejection != Rejection::Busy {
            self.update(|state, events| {
                state.set_status(StatusMessage::error(rejection.to_string()), events)
            })
            .await;
        }
        debug!(%rejection, "Request rejected locally");
        Err(rejection)
    }

    //-------------------------------------------------------------------------------------
    // Identity subscription lifecycle
    //-------------------------------------------------------------------------------------

    /// Starts the standing identity subscription. Calling it twice keeps the first one.
    pub async fn observe_identity(&self) {
        let mut slot = self.inner.subscription.lock().await;
        if slot.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        let mut changes = self.inner.identity.watch();
        let session = self.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            use futures::StreamExt;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    change = changes.next() => match change {
                        Some(identity) => session.apply_identity(identity).await,
                        None => {
                            debug!("Identity provider closed its notification stream");
                            break;
                        }
                    },
                }
            }
        });
        info!("Identity subscription started");
        *slot = Some(Subscription { cancel, handle });
    }

    /// Releases the identity subscription and waits for it to wind down.
    pub async fn shutdown(&self) {
        let subscription = self.inner.subscription.lock().await.take();
        if let Some(subscription) = subscription {
            subscription.cancel.cancel();
            let _ = subscription.handle.await;
            info!("Identity subscription released");
        }
    }

    //-------------------------------------------------------------------------------------
    // Upload
    //-------------------------------------------------------------------------------------

    /// Uploads a document and, on success, moves the session to `DocumentReady`.
    ///
    /// `Err` means the request was refused locally and nothing was sent. `Ok` carries
    /// the settled network outcome, which has already been applied to the state.
    pub async fn upload(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<RequestOutcome<SessionId>, Rejection> {
        let path = path.as_ref();
        let extensions = self.inner.config.document_extensions.clone();

        let precheck = self
            .update(|state, _| -> Result<(), Rejection> {
                state.check_upload()?;
                let name = gateway::document_name(path)?;
                gateway::check_document_name(&name, &extensions)
            })
            .await;
        if let Err(rejection) = precheck {
            return self.reject(rejection).await;
        }

        let file = match gateway::read_document(path).await {
            Ok(file) => file,
            Err(rejection) => return self.reject(rejection).await,
        };

        // The file read was a suspension point; the guard has to hold again.
        let pending = self
            .update(|state, events| -> Result<PendingUpload, Rejection> {
                let token = state.check_upload()?.clone();
                state.set_busy(true, events);
                state.set_status(StatusMessage::info(UPLOADING_STATUS), events);
                Ok(PendingUpload {
                    token,
                    generation: state.generation(),
                })
            })
            .await;
        let pending = match pending {
            Ok(pending) => pending,
            Err(rejection) => return self.reject(rejection).await,
        };

        info!(file = %file.file_name, "Upload started");
        let outcome = self.inner.gateway.upload(&pending.token, file).await;

        self.update(|state, events| {
            if state.generation() != pending.generation {
                debug!("Discarding upload result for an ended session");
                return;
            }
            state.set_busy(false, events);
            match &outcome {
                Ok(session_id) => {
                    info!(session_id = %session_id, "Document ready");
                    state.session_id = Some(session_id.clone());
                    state.clear_log(events);
                    state.append(Turn::system(DOCUMENT_READY_TEXT), events);
                    state.set_status(StatusMessage::info(UPLOADED_STATUS), events);
                }
                Err(failure) => {
                    state.set_status(
                        StatusMessage::error(format!("Error: {}", failure.message)),
                        events,
                    );
                }
            }
        })
        .await;

        Ok(outcome)
    }

    //-------------------------------------------------------------------------------------
    // Ask
    //-------------------------------------------------------------------------------------

    /// Asks a question about the loaded document.
    ///
    /// The user turn is appended before the request is sent; exactly one assistant
    /// or error turn follows when it settles.
    pub async fn ask(
        &self,
        question: impl Into<String>,
    ) -> Result<RequestOutcome<Answer>, Rejection> {
        let question = question.into();

        let pending = self
            .update(|state, events| -> Result<PendingAsk, Rejection> {
                let (token, session_id) = state.check_ask(&question)?;
                let pending = PendingAsk {
                    token: token.clone(),
                    session_id: session_id.clone(),
                    message: question.clone(),
                    generation: state.generation(),
                };
                state.append(Turn::user(question.clone()), events);
                state.set_busy(true, events);
                Ok(pending)
            })
            .await;
        let pending = match pending {
            Ok(pending) => pending,
            Err(rejection) => return self.reject(rejection).await,
        };

        let outcome = self
            .inner
            .gateway
            .ask(&pending.token, &pending.session_id, &pending.message)
            .await;

        self.update(|state, events| {
            if state.generation() != pending.generation {
                debug!("Discarding chat result for an ended session");
                return;
            }
            state.set_busy(false, events);
            match &outcome {
                Ok(answer) => state.append(Turn::assistant(answer.clone()), events),
                Err(failure) => state.append(Turn::error(failure.message.clone()), events),
            }
            events.push(SessionEvent::ScrollToLatest);
        })
        .await;

        Ok(outcome)
    }
}
