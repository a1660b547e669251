use std::sync::Arc;

use chrono::Utc;
use recert_core::AppError;
use recert_domain::CycleId;

use crate::cycle_service::CycleService;
use crate::directory_ports::DirectoryRepository;
use crate::grant_ports::GrantRepository;
use crate::temporal_ports::TemporalStore;
use crate::test_support::{
    built, grant_input_fixture, privilege_fixture, role_fixture, seed_baseline, service_fixture,
    user_fixture, FakeStore,
};

fn service_over(store: &Arc<FakeStore>) -> CycleService {
    CycleService::new(store.clone(), store.clone(), store.clone())
}

#[tokio::test]
async fn initial_cycle_is_seeded_once() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);

    let seeded = built(service.ensure_initial_cycle().await);
    assert_eq!(seeded.title(), "Initial cycle");
    assert!(!seeded.enabled());
    assert!(seeded.is_open());

    let again = built(service.ensure_initial_cycle().await);
    assert_eq!(again.id(), seeded.id());
    assert_eq!(built(service.list_cycles().await).len(), 1);
}

#[tokio::test]
async fn starting_a_cycle_requires_every_population() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    built(service.ensure_initial_cycle().await);

    let result = service.start_new_cycle("Q3 review", true).await;
    let Err(AppError::Precondition(message)) = result else {
        panic!("expected a precondition failure");
    };
    assert!(message.contains("the role table is not populated"));
}

#[tokio::test]
async fn empty_populations_are_reported_in_priority_order() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    built(service.ensure_initial_cycle().await);

    built(
        store
            .insert_role(role_fixture("backupOperator", "Backup Operator", None))
            .await,
    );
    let Err(AppError::Precondition(message)) = service.start_new_cycle("Q3 review", true).await
    else {
        panic!("expected a precondition failure");
    };
    assert!(message.contains("the service table is not populated"));

    built(
        store
            .insert_service(service_fixture("vault", "Vault", "backupOperator"))
            .await,
    );
    let Err(AppError::Precondition(message)) = service.start_new_cycle("Q3 review", true).await
    else {
        panic!("expected a precondition failure");
    };
    assert!(message.contains("the privilege table is not populated"));

    built(
        store
            .insert_privilege(privilege_fixture("vault-read", "vault", "readers"))
            .await,
    );
    let Err(AppError::Precondition(message)) = service.start_new_cycle("Q3 review", true).await
    else {
        panic!("expected a precondition failure");
    };
    assert!(message.contains("the grant table is not populated"));

    built(
        store
            .insert_grant(grant_input_fixture("backupOperator", "vault-read", "vault-read"))
            .await,
    );
    let Err(AppError::Precondition(message)) = service.start_new_cycle("Q3 review", true).await
    else {
        panic!("expected a precondition failure");
    };
    assert!(message.contains("the user table is not populated"));

    built(
        store
            .insert_user(user_fixture("jdoe", "Jo Doe", "backupOperator"))
            .await,
    );
    assert!(service.start_new_cycle("Q3 review", true).await.is_ok());
}

#[tokio::test]
async fn starting_a_cycle_closes_the_current_one() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    let first = built(service.ensure_initial_cycle().await);
    built(seed_baseline(&store).await);

    let second = built(service.start_new_cycle("Q3 review", true).await);
    assert!(second.is_open());
    assert!(second.enabled());

    let closed = built(service.get_cycle(first.id()).await);
    assert!(!closed.is_open());

    assert_eq!(built(service.cycle_at_offset(0).await).id(), second.id());
    assert_eq!(built(service.cycle_at_offset(1).await).id(), first.id());
}

#[tokio::test]
async fn starting_a_cycle_clears_grant_flags() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    built(service.ensure_initial_cycle().await);
    let grant = built(seed_baseline(&store).await);

    let certified = grant.with_update(
        {
            let mut side = grant.role_owner().clone();
            side.is_certified = true;
            side.certified_at = Some(Utc::now());
            side
        },
        {
            let mut side = grant.service_owner().clone();
            side.is_certified = true;
            side.certified_at = Some(Utc::now());
            side
        },
        grant.risk().clone(),
    );
    built(store.update_grant(certified).await);

    built(service.start_new_cycle("Q3 review", true).await);

    let live = built(store.find_grant(grant.id()).await);
    let Some(live) = live else {
        panic!("grant survived the transition");
    };
    assert!(!live.role_owner().is_certified);
    assert!(!live.service_owner().is_certified);
    // The attestation timestamps are history, not flags, and are retained.
    assert!(live.role_owner().certified_at.is_some());
}

#[tokio::test]
async fn closed_cycle_end_still_sees_pre_reset_flags() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    let first = built(service.ensure_initial_cycle().await);
    let grant = built(seed_baseline(&store).await);

    let mut side = grant.role_owner().clone();
    side.is_certified = true;
    built(
        store
            .update_grant(grant.with_update(side, grant.service_owner().clone(), grant.risk().clone()))
            .await,
    );

    built(service.start_new_cycle("Q3 review", true).await);

    let Some(boundary) = built(service.get_cycle(first.id()).await).ended_at() else {
        panic!("first cycle should be closed");
    };
    let as_of_close = built(store.grants_as_of(boundary).await);
    assert_eq!(as_of_close.len(), 1);
    assert!(as_of_close[0].role_owner().is_certified);
}

#[tokio::test]
async fn offset_zero_resolves_to_now() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    built(service.ensure_initial_cycle().await);

    let before = Utc::now();
    let resolved = built(service.resolve_offset_to_timestamp(0).await);
    assert!(resolved >= before);
    assert!(resolved <= Utc::now());
}

#[tokio::test]
async fn offset_one_resolves_to_previous_cycle_end() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    let first = built(service.ensure_initial_cycle().await);
    built(seed_baseline(&store).await);
    built(service.start_new_cycle("Q3 review", true).await);

    let resolved = built(service.resolve_offset_to_timestamp(1).await);
    assert_eq!(Some(resolved), built(service.get_cycle(first.id()).await).ended_at());
}

#[tokio::test]
async fn negative_offset_is_a_validation_error() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);

    assert!(matches!(
        service.resolve_offset_to_timestamp(-1).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        service.cycle_at_offset(-3).await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn offset_beyond_history_is_not_found() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    built(service.ensure_initial_cycle().await);

    assert!(matches!(
        service.resolve_offset_to_timestamp(5).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn update_keeps_lifecycle_timestamps() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    let seeded = built(service.ensure_initial_cycle().await);

    let updated = built(service.update_cycle(seeded.id(), "Q3 review", true).await);
    assert_eq!(updated.title(), "Q3 review");
    assert!(updated.enabled());
    assert_eq!(updated.started_at(), seeded.started_at());
    assert!(updated.is_open());

    assert!(matches!(
        service.update_cycle(seeded.id(), "", true).await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn deleting_an_unknown_cycle_is_not_found() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);

    assert!(matches!(
        service.delete_cycle(CycleId::new(42)).await,
        Err(AppError::NotFound(_))
    ));
}
