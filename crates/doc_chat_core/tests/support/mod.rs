//! In-memory stand-ins for the identity provider and the document backend.

#![allow(dead_code)]

use async_trait::async_trait;
use doc_chat_core::{
    Answer, BearerToken, DocumentBackend, DocumentFile, Identity, IdentityProvider,
    IdentityStream, PortError, PortResult, Session, SessionConfig, SessionId, SessionState,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

pub fn identity(uid: &str) -> Identity {
    Identity {
        uid: uid.to_string(),
        display_name: Some(format!("User {}", uid)),
        email: Some(format!("{}@example.com", uid)),
        avatar_url: None,
    }
}

//=========================================================================================
// Identity provider
//=========================================================================================

pub struct FakeIdentity {
    notifier: mpsc::UnboundedSender<Option<Identity>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Option<Identity>>>>,
    sign_in_result: Mutex<PortResult<Identity>>,
    pub sign_out_fails: AtomicBool,
    token_result: Mutex<Option<PortError>>,
    token_delay: Mutex<Option<Duration>>,
    pub token_calls: AtomicUsize,
}

impl FakeIdentity {
    pub fn new(user: Identity) -> Arc<Self> {
        let (notifier, receiver) = mpsc::unbounded_channel();
        Arc::new(Self {
            notifier,
            receiver: Mutex::new(Some(receiver)),
            sign_in_result: Mutex::new(Ok(user)),
            sign_out_fails: AtomicBool::new(false),
            token_result: Mutex::new(None),
            token_delay: Mutex::new(None),
            token_calls: AtomicUsize::new(0),
        })
    }

    pub fn fail_sign_in(&self, message: &str) {
        *self.sign_in_result.lock().unwrap() = Err(PortError::Auth(message.to_string()));
    }

    /// Makes every following token request fail with `err`; `None` restores success.
    pub fn fail_tokens(&self, err: Option<PortError>) {
        *self.token_result.lock().unwrap() = err;
    }

    /// Delays every following token request.
    pub fn slow_tokens(&self, delay: Duration) {
        *self.token_delay.lock().unwrap() = Some(delay);
    }

    /// Pushes one change notification through the standing subscription.
    /// Sending after the subscription was released is silently dropped.
    pub fn notify(&self, change: Option<Identity>) {
        let _ = self.notifier.send(change);
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn sign_in(&self) -> PortResult<Identity> {
        self.sign_in_result.lock().unwrap().clone()
    }

    async fn sign_out(&self) -> PortResult<()> {
        if self.sign_out_fails.load(Ordering::SeqCst) {
            Err(PortError::Auth("network down".into()))
        } else {
            Ok(())
        }
    }

    async fn get_token(&self, identity: &Identity) -> PortResult<BearerToken> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.token_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.token_result.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(BearerToken::new(format!("token-for-{}", identity.uid)))
    }

    fn watch(&self) -> IdentityStream {
        match self.receiver.lock().unwrap().take() {
            Some(receiver) => futures::stream::unfold(receiver, |mut receiver| async move {
                receiver.recv().await.map(|change| (change, receiver))
            })
            .boxed(),
            None => futures::stream::empty().boxed(),
        }
    }
}

//=========================================================================================
// Document backend
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ChatCall {
    pub token: String,
    pub session_id: String,
    pub message: String,
}

pub struct FakeBackend {
    upload_reply: Mutex<PortResult<SessionId>>,
    chat_reply: Mutex<PortResult<Answer>>,
    /// When set, requests park until the gate is opened.
    gate: Mutex<Option<Arc<Notify>>>,
    pub upload_calls: AtomicUsize,
    pub chat_calls: Mutex<Vec<ChatCall>>,
    pub uploaded: Mutex<Vec<(String, String)>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            upload_reply: Mutex::new(Ok(SessionId::new("abc123"))),
            chat_reply: Mutex::new(Ok(Answer {
                text: "ok".into(),
                citations: Vec::new(),
            })),
            gate: Mutex::new(None),
            upload_calls: AtomicUsize::new(0),
            chat_calls: Mutex::new(Vec::new()),
            uploaded: Mutex::new(Vec::new()),
        })
    }

    pub fn reply_upload(&self, reply: PortResult<SessionId>) {
        *self.upload_reply.lock().unwrap() = reply;
    }

    pub fn reply_chat(&self, reply: PortResult<Answer>) {
        *self.chat_reply.lock().unwrap() = reply;
    }

    /// Holds every following request until the returned gate is notified.
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn chat_count(&self) -> usize {
        self.chat_calls.lock().unwrap().len()
    }

    async fn wait_at_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl DocumentBackend for FakeBackend {
    async fn upload(&self, token: &BearerToken, file: DocumentFile) -> PortResult<SessionId> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.uploaded
            .lock()
            .unwrap()
            .push((token.as_str().to_string(), file.file_name));
        self.wait_at_gate().await;
        self.upload_reply.lock().unwrap().clone()
    }

    async fn chat(
        &self,
        token: &BearerToken,
        session_id: &SessionId,
        message: &str,
    ) -> PortResult<Answer> {
        self.chat_calls.lock().unwrap().push(ChatCall {
            token: token.as_str().to_string(),
            session_id: session_id.as_str().to_string(),
            message: message.to_string(),
        });
        self.wait_at_gate().await;
        self.chat_reply.lock().unwrap().clone()
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

pub fn session(identity: Arc<FakeIdentity>, backend: Arc<FakeBackend>) -> Session {
    Session::new(identity, backend, SessionConfig::default())
}

/// A session that has already signed in as `alice`.
pub async fn signed_in(backend: Arc<FakeBackend>) -> (Session, Arc<FakeIdentity>) {
    let provider = FakeIdentity::new(identity("alice"));
    let session = session(provider.clone(), backend);
    session.login().await.unwrap();
    (session, provider)
}

/// Writes a small fake PDF and returns its directory guard and path.
pub fn pdf_fixture(name: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, b"%PDF-1.4 fake").unwrap();
    (dir, path)
}

/// A signed-in session with `abc123` already uploaded.
pub async fn with_document(backend: Arc<FakeBackend>) -> (Session, Arc<FakeIdentity>) {
    let (session, provider) = signed_in(backend).await;
    let (_dir, path) = pdf_fixture("notes.pdf");
    session.upload(&path).await.unwrap().unwrap();
    (session, provider)
}

/// Polls the session until `check` holds, failing after two seconds.
pub async fn wait_until(session: &Session, check: impl Fn(&SessionState) -> bool) -> SessionState {
    for _ in 0..400 {
        let state = session.snapshot().await;
        if check(&state) {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("session never reached the expected state");
}
