use chrono::Duration;
use portal_core::model::{ActivityId, ActivityResult, ActivityScore, SessionActivityId, SessionId};
use portal_core::time::fixed_clock;
use services::{Entity, PortalServices, SessionServiceError};
use storage::repository::Storage;
use storage::sqlite::SqliteConfig;

async fn sqlite_services(name: &str, clock: portal_core::Clock) -> PortalServices {
    let config = SqliteConfig::new(format!("sqlite:file:{name}?mode=memory&cache=shared"));
    PortalServices::new_sqlite(&config, clock)
        .await
        .expect("sqlite services")
}

async fn first_activity(services: &PortalServices) -> ActivityId {
    services.catalog().seed_defaults().await.unwrap();
    services.catalog().list_activities().await.unwrap()[0].id
}

#[tokio::test]
async fn full_session_lifecycle() {
    let services = sqlite_services("svc_lifecycle", fixed_clock()).await;
    let activity_id = first_activity(&services).await;
    let sessions = services.sessions();

    let session = sessions.create_session(activity_id, None).await.unwrap();
    assert!(session.id().is_valid());
    assert_eq!(session.end_time(), None);
    assert_eq!(session.score(), 0);
    assert_eq!(sessions.get_session(session.id()).await.unwrap(), session);

    let activity = sessions
        .add_session_activity(session.id(), activity_id, "hello", "नमस्ते", "")
        .await
        .unwrap();
    assert_eq!(activity.result(), None);
    assert_eq!(activity.score(), ActivityScore::ZERO);

    let evaluated = sessions
        .evaluate_session_activity(activity.id(), ActivityResult::Success, 100)
        .await
        .unwrap();
    assert_eq!(evaluated.result(), Some(ActivityResult::Success));
    assert_eq!(evaluated.score().value(), 100);

    let closed = sessions.end_session(session.id(), 80).await.unwrap();
    let reloaded = sessions.get_session(session.id()).await.unwrap();
    assert_eq!(reloaded, closed);
    assert_eq!(reloaded.score(), 80);
    let end = reloaded.end_time().expect("closed session has an end time");
    assert!(end >= reloaded.start_time());

    let results = sessions.session_results(session.id()).await.unwrap();
    assert_eq!(results.activities.len(), 1);
    assert_eq!(results.average_score, Some(100.0));
}

#[tokio::test]
async fn unknown_session_writes_nothing() {
    let services = sqlite_services("svc_unknown_session", fixed_clock()).await;
    let activity_id = first_activity(&services).await;
    let sessions = services.sessions();

    let err = sessions
        .add_session_activity(SessionId::new(999_999), activity_id, "hello", "नमस्ते", "")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionServiceError::NotFound { entity: Entity::Session, id: 999_999 }
    ));
    assert!(err.is_client_error());

    let purge = sessions.delete_all_sessions().await.unwrap();
    assert!(purge.is_noop());
}

#[tokio::test]
async fn purge_removes_everything_then_becomes_noop() {
    let config = SqliteConfig::new("sqlite:file:svc_purge?mode=memory&cache=shared");
    let storage = Storage::sqlite(&config).await.expect("sqlite storage");
    let mut clock = fixed_clock();
    let activity_id = first_activity(&PortalServices::from_storage(&storage, clock)).await;

    let mut added = 0;
    for words in [&["dog", "cat", "cow"][..], &["sun", "moon"][..], &["red", "blue"][..]] {
        let sessions = PortalServices::from_storage(&storage, clock).sessions();
        let session = sessions.create_session(activity_id, None).await.unwrap();
        for word in words {
            sessions
                .add_session_activity(session.id(), activity_id, word, "x", "")
                .await
                .unwrap();
            added += 1;
        }
        clock.advance(Duration::minutes(1));
    }
    assert_eq!(added, 7);

    let sessions = PortalServices::from_storage(&storage, clock).sessions();
    let outcome = sessions.delete_all_sessions().await.unwrap();
    assert_eq!(outcome.sessions_deleted, 3);
    assert_eq!(outcome.activities_deleted, 7);

    let page = sessions.list_sessions(1, 10).await.unwrap();
    assert!(page.is_empty());
    assert_eq!(page.total, 0);

    assert!(sessions.delete_all_sessions().await.unwrap().is_noop());
}

#[tokio::test]
async fn listing_falls_back_to_defaults() {
    let services = sqlite_services("svc_paging", fixed_clock()).await;
    let activity_id = first_activity(&services).await;
    let sessions = services.sessions();
    for _ in 0..12 {
        sessions.create_session(activity_id, None).await.unwrap();
    }

    for (page, size) in [(0, 0), (-3, -1), (1, 500)] {
        let listed = sessions.list_sessions(page, size).await.unwrap();
        assert_eq!(listed.page, 1);
        assert_eq!(listed.page_size, 10);
        assert_eq!(listed.items.len(), 10);
        assert_eq!(listed.total, 12);
        assert_eq!(listed.total_pages, 2);
    }

    let second = sessions.list_sessions(2, 10).await.unwrap();
    assert_eq!(second.items.len(), 2);

    let beyond = sessions.list_sessions(5_000_000_000, 10).await.unwrap();
    assert_eq!(beyond.page, u32::MAX);
    assert!(beyond.is_empty());
    assert_eq!(beyond.total, 12);
}

#[tokio::test]
async fn evaluation_rejected_after_close_keeps_prior_verdict() {
    let services = sqlite_services("svc_closed_eval", fixed_clock()).await;
    let activity_id = first_activity(&services).await;
    let sessions = services.sessions();

    let session = sessions.create_session(activity_id, None).await.unwrap();
    let activity = sessions
        .add_session_activity(session.id(), activity_id, "water", "पानी", "pani")
        .await
        .unwrap();
    sessions
        .evaluate_session_activity(activity.id(), ActivityResult::Failure, 30)
        .await
        .unwrap();
    sessions.end_session(session.id(), 30).await.unwrap();

    let err = sessions
        .evaluate_session_activity(activity.id(), ActivityResult::Success, 100)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionServiceError::Conflict { .. }));

    let err = sessions.end_session(session.id(), 99).await.unwrap_err();
    assert!(matches!(err, SessionServiceError::Conflict { .. }));

    let stored = sessions.get_session_activity(activity.id()).await.unwrap();
    assert_eq!(stored.result(), Some(ActivityResult::Failure));
    assert_eq!(stored.score().value(), 30);
    assert_eq!(sessions.get_session(session.id()).await.unwrap().score(), 30);
}

#[tokio::test]
async fn delete_session_cascades_through_service() {
    let services = sqlite_services("svc_delete_one", fixed_clock()).await;
    let activity_id = first_activity(&services).await;
    let sessions = services.sessions();

    let keep = sessions.create_session(activity_id, None).await.unwrap();
    let gone = sessions.create_session(activity_id, None).await.unwrap();
    for session in [&keep, &gone] {
        sessions
            .add_session_activity(session.id(), activity_id, "tree", "पेड़", "")
            .await
            .unwrap();
    }

    assert_eq!(sessions.delete_session(gone.id()).await.unwrap(), 1);
    assert_eq!(sessions.list_session_activities(keep.id()).await.unwrap().len(), 1);
    let err = sessions.list_session_activities(gone.id()).await.unwrap_err();
    assert!(matches!(err, SessionServiceError::NotFound { .. }));
}

#[tokio::test]
async fn end_and_evaluate_on_unknown_ids_are_not_found() {
    let services = sqlite_services("svc_unknown_ids", fixed_clock()).await;
    let sessions = services.sessions();

    let err = sessions.end_session(SessionId::new(999_999), 40).await.unwrap_err();
    assert!(matches!(
        err,
        SessionServiceError::NotFound { entity: Entity::Session, id: 999_999 }
    ));

    let err = sessions
        .evaluate_session_activity(SessionActivityId::new(999_999), ActivityResult::Failure, 0)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionServiceError::NotFound { entity: Entity::SessionActivity, id: 999_999 }
    ));
}

#[tokio::test]
async fn concurrent_closes_let_exactly_one_win() {
    let services = sqlite_services("svc_concurrent_close", fixed_clock()).await;
    let activity_id = first_activity(&services).await;
    let sessions = services.sessions();

    for _ in 0..20 {
        let session = sessions.create_session(activity_id, None).await.unwrap();
        let (a, b) = tokio::join!(
            sessions.end_session(session.id(), 10),
            sessions.end_session(session.id(), 90),
        );

        let winner = match (a, b) {
            (Ok(won), Err(lost)) | (Err(lost), Ok(won)) => {
                assert!(matches!(lost, SessionServiceError::Conflict { .. }));
                won
            }
            (a, b) => panic!("expected one close to win, got {a:?} and {b:?}"),
        };
        let stored = sessions.get_session(session.id()).await.unwrap();
        assert_eq!(stored.score(), winner.score());
        assert_eq!(stored, winner);
    }
}

#[tokio::test]
async fn evaluation_racing_a_close_never_lands_afterwards() {
    let services = sqlite_services("svc_close_vs_eval", fixed_clock()).await;
    let activity_id = first_activity(&services).await;
    let sessions = services.sessions();

    for _ in 0..20 {
        let session = sessions.create_session(activity_id, None).await.unwrap();
        let activity = sessions
            .add_session_activity(session.id(), activity_id, "milk", "दूध", "doodh")
            .await
            .unwrap();

        let (evaluated, closed) = tokio::join!(
            sessions.evaluate_session_activity(activity.id(), ActivityResult::Success, 70),
            sessions.end_session(session.id(), 70),
        );
        closed.unwrap();

        let stored = sessions.get_session_activity(activity.id()).await.unwrap();
        match evaluated {
            Ok(evaluated) => assert_eq!(stored, evaluated),
            Err(err) => {
                assert!(matches!(err, SessionServiceError::Conflict { .. }));
                assert_eq!(stored.result(), None);
            }
        }
    }
}
