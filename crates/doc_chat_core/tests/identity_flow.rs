//! Credential handling: the identity subscription, login and logout.

mod support;

use doc_chat_core::{
    Phase, PortError, Rejection, Session, SessionConfig, SessionEvent, SessionId, StatusLevel,
};
use std::sync::atomic::Ordering;
use std::time::Duration;
use support::{identity, signed_in, wait_until, with_document, FakeBackend, FakeIdentity};

#[tokio::test]
async fn token_follows_the_latest_notification() {
    let provider = FakeIdentity::new(identity("alice"));
    let session = support::session(provider.clone(), FakeBackend::new());
    session.observe_identity().await;

    let sequence = [
        Some(identity("alice")),
        None,
        Some(identity("bob")),
        Some(identity("bob")),
        None,
        None,
        Some(identity("carol")),
    ];
    for (step, change) in sequence.iter().enumerate() {
        provider.notify(change.clone());
        let expected_uid = change.as_ref().map(|user| user.uid.clone());
        let state = wait_until(&session, |state| {
            state.identity().map(|user| user.uid.clone()) == expected_uid
        })
        .await;
        assert_eq!(
            state.token().map(|t| !t.is_empty()).unwrap_or(false),
            change.is_some(),
            "token presence mismatch at step {}",
            step
        );
        if let Some(user) = change {
            assert_eq!(
                state.token().unwrap().as_str(),
                format!("token-for-{}", user.uid)
            );
        }
    }

    session.shutdown().await;
}

#[tokio::test]
async fn repeated_notification_for_same_user_keeps_the_document() {
    let backend = FakeBackend::new();
    let (session, provider) = with_document(backend).await;
    session.observe_identity().await;
    let calls_before = provider.token_calls.load(Ordering::SeqCst);

    provider.notify(Some(identity("alice")));
    wait_until(&session, |_| provider.token_calls.load(Ordering::SeqCst) > calls_before).await;
    let state = wait_until(&session, |state| state.token().is_some()).await;

    assert_eq!(state.session_id(), Some(&SessionId::new("abc123")));
    assert_eq!(state.log().len(), 1);
    session.shutdown().await;
}

#[tokio::test]
async fn switching_users_drops_the_previous_document() {
    let backend = FakeBackend::new();
    let (session, provider) = with_document(backend).await;
    session.observe_identity().await;

    provider.notify(Some(identity("mallory")));
    let state = wait_until(&session, |state| {
        state.identity().map(|user| user.uid.as_str()) == Some("mallory")
    })
    .await;

    assert_eq!(state.phase(), Phase::Authenticated);
    assert!(state.log().is_empty());
    assert_eq!(state.token().unwrap().as_str(), "token-for-mallory");
    session.shutdown().await;
}

#[tokio::test]
async fn provider_sign_out_notification_ends_the_session() {
    let backend = FakeBackend::new();
    let (session, provider) = with_document(backend).await;
    session.observe_identity().await;

    provider.notify(None);
    let state = wait_until(&session, |state| state.phase() == Phase::Anonymous).await;

    assert!(state.token().is_none());
    assert!(state.session_id().is_none());
    assert!(state.log().is_empty());
    session.shutdown().await;
}

#[tokio::test]
async fn logout_clears_everything_at_once() {
    let backend = FakeBackend::new();
    let (session, _provider) = with_document(backend).await;
    session.ask("What is this?").await.unwrap().unwrap();
    let mut events = session.subscribe();

    session.logout().await.unwrap();

    let state = session.snapshot().await;
    assert!(state.identity().is_none());
    assert!(state.token().is_none());
    assert!(state.session_id().is_none());
    assert!(state.log().is_empty());

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            SessionEvent::LogCleared,
            SessionEvent::PhaseChanged(Phase::Anonymous)
        ]
    );
}

#[tokio::test]
async fn failed_logout_keeps_local_state() {
    let backend = FakeBackend::new();
    let (session, provider) = with_document(backend).await;
    provider.sign_out_fails.store(true, Ordering::SeqCst);

    session.logout().await.unwrap();

    let state = session.snapshot().await;
    assert_eq!(state.phase(), Phase::DocumentReady);
    assert_eq!(state.log().len(), 1);
    let status = state.status().unwrap();
    assert_eq!(status.level, StatusLevel::Error);
    assert!(status.text.starts_with("Logout failed"));
}

#[tokio::test]
async fn failed_login_stays_anonymous() {
    let provider = FakeIdentity::new(identity("alice"));
    provider.fail_sign_in("popup closed by user");
    let session = support::session(provider, FakeBackend::new());

    session.login().await.unwrap();

    let state = session.snapshot().await;
    assert_eq!(state.phase(), Phase::Anonymous);
    assert_eq!(
        state.status().unwrap().text,
        "Login failed: popup closed by user"
    );
}

#[tokio::test]
async fn login_twice_is_refused() {
    let (session, provider) = signed_in(FakeBackend::new()).await;
    let calls = provider.token_calls.load(Ordering::SeqCst);

    assert_eq!(session.login().await, Err(Rejection::AlreadyAuthenticated));
    assert_eq!(provider.token_calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn logout_while_anonymous_is_refused() {
    let session = support::session(FakeIdentity::new(identity("alice")), FakeBackend::new());

    assert_eq!(session.logout().await, Err(Rejection::NotAuthenticated));
}

#[tokio::test]
async fn shutdown_releases_the_subscription() {
    let provider = FakeIdentity::new(identity("alice"));
    let session = support::session(provider.clone(), FakeBackend::new());
    session.observe_identity().await;
    session.shutdown().await;

    provider.notify(Some(identity("alice")));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(session.phase().await, Phase::Anonymous);
    assert_eq!(provider.token_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_token_refresh_leaves_the_session_anonymous() {
    let provider = FakeIdentity::new(identity("alice"));
    let session = support::session(provider.clone(), FakeBackend::new());
    session.observe_identity().await;
    provider.fail_tokens(Some(PortError::Auth("revoked".into())));

    provider.notify(Some(identity("alice")));
    let state = wait_until(&session, |state| state.status().is_some()).await;

    assert_eq!(state.phase(), Phase::Anonymous);
    assert!(state.token().is_none());
    let status = state.status().unwrap();
    assert_eq!(status.level, StatusLevel::Error);
    assert_eq!(status.text, "Could not refresh credentials: revoked");

    provider.fail_tokens(None);
    provider.notify(Some(identity("alice")));
    let state = wait_until(&session, |state| state.phase() == Phase::Authenticated).await;
    assert_eq!(state.token().unwrap().as_str(), "token-for-alice");
    session.shutdown().await;
}

#[tokio::test]
async fn failed_token_refresh_drops_a_loaded_document() {
    let (session, provider) = with_document(FakeBackend::new()).await;
    session.observe_identity().await;
    provider.fail_tokens(Some(PortError::Auth("revoked".into())));

    provider.notify(Some(identity("alice")));
    let state = wait_until(&session, |state| state.phase() == Phase::Anonymous).await;

    assert!(state.session_id().is_none());
    assert!(state.log().is_empty());
    session.shutdown().await;
}

#[tokio::test]
async fn slow_token_refresh_times_out() {
    let provider = FakeIdentity::new(identity("alice"));
    let config = SessionConfig {
        request_timeout: Some(Duration::from_millis(50)),
        ..SessionConfig::default()
    };
    let session = Session::new(provider.clone(), FakeBackend::new(), config);
    session.observe_identity().await;
    provider.slow_tokens(Duration::from_secs(5));

    provider.notify(Some(identity("alice")));
    let state = wait_until(&session, |state| state.status().is_some()).await;

    assert_eq!(state.phase(), Phase::Anonymous);
    assert!(state.token().is_none());
    assert_eq!(
        state.status().unwrap().text,
        "Could not refresh credentials: Request timed out after 50ms"
    );
    session.shutdown().await;
}
