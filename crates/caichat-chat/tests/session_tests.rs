mod common;

use common::{credentials, open_session, FakeUpstream};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use caichat_chat::{ChatOrchestrator, Directory, SessionManager, StreamPacing};
use caichat_types::RelayError;

#[tokio::test]
async fn test_open_caches_identity() {
    let (upstream, session) = open_session(FakeUpstream::new()).await;

    assert!(session.is_open());
    assert_eq!(session.identity().unwrap().username, "tester");

    // Reopening does not authenticate again
    let again = session.open(&credentials()).await.unwrap();
    assert_eq!(again.username, "tester");
    assert_eq!(upstream.open_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_open_leaves_everything_unauthenticated() {
    let upstream = Arc::new(FakeUpstream::rejecting_login());
    let session = SessionManager::new(upstream.clone());

    let err = session.open(&credentials()).await.unwrap_err();
    assert!(matches!(err, RelayError::Auth(_)));

    assert!(!session.is_open());
    assert_eq!(session.identity().unwrap_err(), RelayError::NotAuthenticated);
    assert!(matches!(session.client(), Err(RelayError::NotAuthenticated)));
    assert!(matches!(
        ChatOrchestrator::new(&session, StreamPacing::none()),
        Err(RelayError::NotAuthenticated)
    ));
    assert!(matches!(
        Directory::new(&session),
        Err(RelayError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let (upstream, session) = open_session(FakeUpstream::new()).await;

    session.close().await;
    session.close().await;

    assert_eq!(upstream.closes(), 1);
    assert!(!session.is_open());
    assert!(matches!(session.client(), Err(RelayError::SessionClosed)));
    assert!(matches!(
        session.open(&credentials()).await,
        Err(RelayError::SessionClosed)
    ));
}

#[tokio::test]
async fn test_run_scoped_closes_after_body() {
    let upstream = Arc::new(FakeUpstream::new());
    let session = SessionManager::new(upstream.clone());

    let name = session
        .run_scoped(&credentials(), |identity| async move { identity.username })
        .await
        .unwrap();

    assert_eq!(name, "tester");
    assert_eq!(upstream.closes(), 1);
}

#[tokio::test]
async fn test_run_scoped_closes_after_failed_open() {
    let upstream = Arc::new(FakeUpstream::rejecting_login());
    let session = SessionManager::new(upstream.clone());

    let result = session
        .run_scoped(&credentials(), |_identity| async move { 42 })
        .await;

    assert!(matches!(result, Err(RelayError::Auth(_))));
    assert_eq!(upstream.closes(), 1);
}

#[tokio::test]
async fn test_run_scoped_closes_when_body_panics() {
    let upstream = Arc::new(FakeUpstream::new());
    let session = Arc::new(SessionManager::new(upstream.clone()));

    let scoped = Arc::clone(&session);
    let handle = tokio::spawn(async move {
        scoped
            .run_scoped(&credentials(), |_identity| async move {
                panic!("body failed");
            })
            .await
    });

    let join = handle.await;
    assert!(join.unwrap_err().is_panic());
    assert_eq!(upstream.closes(), 1);
    assert!(!session.is_open());
}
