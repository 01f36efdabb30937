//! Service tests for the Users domain
//!
//! These run the full service against the in-memory repository, so they cover
//! validation, uniqueness, password handling and event publication without
//! needing a database.

use domain_users::*;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{assertions::*, TestDataBuilder};
use tokio::sync::mpsc::UnboundedReceiver;

fn service_with_bus(events: EventBus) -> UserService<InMemoryUserRepository> {
    UserService::new(
        InMemoryUserRepository::new(events),
        Arc::new(BcryptHasher::new(4)),
        UserServiceConfig::default(),
    )
}

fn service() -> UserService<InMemoryUserRepository> {
    service_with_bus(EventBus::new())
}

async fn next_event(rx: &mut UnboundedReceiver<UserEvent>) -> UserEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_create_user_populates_server_fields() {
    let service = service();
    let builder = TestDataBuilder::from_test_name("create_populates");

    let created = service
        .create_user(CreateUser::new(
            builder.email("alice"),
            builder.username("alice"),
            builder.password(),
        ))
        .await
        .unwrap();

    assert!(created.id > 0);
    assert_eq!(created.created_at, created.updated_at);
    assert_ne!(created.password_hash, builder.password());
    assert!(!created.password_hash.is_empty());
}

#[tokio::test]
async fn test_round_trip_by_email_uses_defaults() {
    let service = service();

    service
        .create_user(CreateUser::new("a@b.com", "a", "longenough1"))
        .await
        .unwrap();

    let fetched = service.get_user_by_email("a@b.com").await.unwrap();
    assert_eq!(fetched.username, "a");
    assert_eq!(fetched.full_name, "");
    assert!(fetched.is_active);
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let service = service();
    let builder = TestDataBuilder::from_test_name("duplicate_email");
    let email = builder.email("dup");

    service
        .create_user(CreateUser::new(&email, builder.username("first"), "longenough1"))
        .await
        .unwrap();

    let err = assert_err(
        service
            .create_user(CreateUser::new(&email, builder.username("second"), "longenough1"))
            .await,
        "second create with same email",
    );
    assert!(matches!(err, UserError::Conflict(_)));
}

#[tokio::test]
async fn test_concurrent_duplicate_creates_yield_one_conflict() {
    let service = service();

    let first = service.create_user(CreateUser::new("race@example.com", "racer1", "longenough1"));
    let second = service.create_user(CreateUser::new("race@example.com", "racer2", "longenough1"));
    let (a, b) = tokio::join!(first, second);

    let outcomes = [a.is_ok(), b.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    let err = a.err().or(b.err()).unwrap();
    assert!(matches!(err, UserError::Conflict(_)));
    assert_eq!(service.count_users(&UserFilter::default()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_update_with_empty_password_keeps_hash() {
    let service = service();
    let created = service
        .create_user(CreateUser::new("keep@example.com", "keep", "longenough1"))
        .await
        .unwrap();

    let update = UpdateUser {
        full_name: "Keeper".into(),
        ..UpdateUser::from(&created)
    };
    let updated = service.update_user(created.id, update).await.unwrap();

    assert_eq!(updated.password_hash, created.password_hash);
    assert_eq!(updated.full_name, "Keeper");
    assert!(service.verify_password(&updated, "longenough1").unwrap());
}

#[tokio::test]
async fn test_update_with_new_password_rehashes() {
    let service = service();
    let created = service
        .create_user(CreateUser::new("change@example.com", "change", "longenough1"))
        .await
        .unwrap();

    let update = UpdateUser {
        password: "differentpass".into(),
        ..UpdateUser::from(&created)
    };
    let updated = service.update_user(created.id, update).await.unwrap();

    assert_ne!(updated.password_hash, created.password_hash);
    assert!(service.verify_password(&updated, "differentpass").unwrap());
    assert!(!service.verify_password(&updated, "longenough1").unwrap());
    assert!(updated.created_at <= updated.updated_at);
}

#[tokio::test]
async fn test_active_filter_list_matches_count() {
    let service = service();
    for (name, active) in [("u1", true), ("u2", false), ("u3", true), ("u4", false)] {
        let mut input = CreateUser::new(format!("{}@example.com", name), name, "longenough1");
        input.is_active = active;
        service.create_user(input).await.unwrap();
    }

    let filter = UserFilter::active(true);
    let active = service.list_users(&filter).await.unwrap();

    assert!(active.iter().all(|u| u.is_active));
    assert_eq!(active.len(), 2);
    assert_eq!(service.count_users(&filter).await.unwrap(), active.len() as u64);
}

#[tokio::test]
async fn test_zero_limit_lists_nothing() {
    let service = service();
    service
        .create_user(CreateUser::new("z@example.com", "z", "longenough1"))
        .await
        .unwrap();

    let filter = UserFilter {
        limit: Some(0),
        ..UserFilter::default()
    };
    assert!(service.list_users(&filter).await.unwrap().is_empty());
    assert_eq!(service.count_users(&filter).await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_missing_user_publishes_nothing() {
    let events = EventBus::new();
    let (listener, mut rx) = ChannelListener::channel();
    events.attach(Arc::new(listener));
    let service = service_with_bus(events);

    let err = service.delete_user(12345).await.unwrap_err();
    assert!(err.is_not_found());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_two_listeners_each_observe_one_created_event() {
    let events = EventBus::new();
    let (first, mut first_rx) = ChannelListener::channel();
    let (second, mut second_rx) = ChannelListener::channel();
    events.attach(Arc::new(first));
    events.attach(Arc::new(second));
    let service = service_with_bus(events);

    let created = service
        .create_user(CreateUser::new("evt@example.com", "evt", "longenough1"))
        .await
        .unwrap();

    for rx in [&mut first_rx, &mut second_rx] {
        let event = next_event(rx).await;
        assert_eq!(event.kind(), EventKind::Created);
        assert_eq!(event, UserEvent::Created(created.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err(), "expected exactly one event");
    }
}

#[tokio::test]
async fn test_update_and_delete_publish_events() {
    let events = EventBus::new();
    let (listener, mut rx) = ChannelListener::channel();
    events.attach(Arc::new(listener));
    let service = service_with_bus(events);

    let created = service
        .create_user(CreateUser::new("life@example.com", "life", "longenough1"))
        .await
        .unwrap();
    assert_eq!(next_event(&mut rx).await.kind(), EventKind::Created);

    service
        .update_user(created.id, UpdateUser::from(&created))
        .await
        .unwrap();
    assert_eq!(next_event(&mut rx).await.kind(), EventKind::Updated);

    service.delete_user(created.id).await.unwrap();
    assert_eq!(next_event(&mut rx).await, UserEvent::Deleted { id: created.id });
}

#[tokio::test]
async fn test_swapping_hasher_needs_no_service_change() {
    for hasher in [
        Arc::new(BcryptHasher::new(4)) as Arc<dyn PasswordHasher>,
        Arc::new(Argon2Hasher),
        Arc::new(Sha256Hasher::new("pepper")),
    ] {
        let service = UserService::new(
            InMemoryUserRepository::new(EventBus::new()),
            hasher,
            UserServiceConfig::default(),
        );

        let created = service
            .create_user(CreateUser::new("swap@example.com", "swap", "longenough1"))
            .await
            .unwrap();
        assert!(service.verify_password(&created, "longenough1").unwrap());
    }
}

#[tokio::test]
async fn test_update_never_accepts_passwords_bcrypt_would_cut() {
    let service = service();
    let created = service
        .create_user(CreateUser::new("long@example.com", "long", "longenough1"))
        .await
        .unwrap();

    let prefix = "p".repeat(72);
    let at_limit = UpdateUser {
        password: prefix.clone(),
        ..UpdateUser::from(&created)
    };
    let updated = service.update_user(created.id, at_limit).await.unwrap();
    assert!(service.verify_password(&updated, &prefix).unwrap());

    let first = format!("{}-first", prefix);
    let err = service
        .update_user(
            created.id,
            UpdateUser {
                password: first.clone(),
                ..UpdateUser::from(&updated)
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, UserError::Validation(_)));

    let stored = service.get_user_by_id(created.id).await.unwrap();
    assert_eq!(stored.password_hash, updated.password_hash);
    assert!(!service.verify_password(&stored, &first).unwrap());
}

#[tokio::test]
async fn test_relaxed_length_policy_still_rejects_long_bcrypt_passwords() {
    let service = UserService::new(
        InMemoryUserRepository::new(EventBus::new()),
        Arc::new(BcryptHasher::new(4)),
        UserServiceConfig {
            max_password_length: 128,
            ..UserServiceConfig::default()
        },
    );

    let err = service
        .create_user(CreateUser::new("x@example.com", "x", "x".repeat(72) + "A"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "password is too long");
    assert_eq!(service.count_users(&UserFilter::default()).await.unwrap(), 0);
}
