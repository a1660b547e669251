use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use recert_core::AppError;
use recert_domain::{Grant, GrantId, PrivilegeId, RoleId, UserId};

use crate::cycle_service::CycleService;
use crate::directory_ports::DirectoryRepository;
use crate::grant_ports::GrantRepository;
use crate::snapshot_service::SnapshotService;
use crate::test_support::{
    built, grant_input_fixture, privilege_fixture, role_fixture, seed_baseline, FakeStore,
};

fn service_over(store: &Arc<FakeStore>) -> SnapshotService {
    let cycles = CycleService::new(store.clone(), store.clone(), store.clone());
    SnapshotService::new(store.clone(), cycles)
}

/// Lets the clock move past the previous write so a freshly captured
/// instant falls strictly between two versions.
async fn tick() {
    tokio::time::sleep(StdDuration::from_millis(2)).await;
}

fn certified_on_both_sides(grant: &Grant) -> Grant {
    let mut role_owner = grant.role_owner().clone();
    role_owner.is_certified = true;
    let mut service_owner = grant.service_owner().clone();
    service_owner.is_certified = true;
    grant.with_update(role_owner, service_owner, grant.risk().clone())
}

#[tokio::test]
async fn snapshot_before_any_data_is_empty() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    built(seed_baseline(&store).await);

    let before = Utc::now() - Duration::minutes(5);
    assert!(built(service.grant_snapshots_at(before).await).is_empty());
    assert!(built(service.user_snapshots_at(before).await).is_empty());
}

#[tokio::test]
async fn snapshot_composes_the_joined_row() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    let grant = built(seed_baseline(&store).await);

    let rows = built(service.grant_snapshots_at(Utc::now()).await);
    assert_eq!(rows.len(), 1);

    let row = &rows[0];
    assert_eq!(row.grant_id, grant.id().as_i64());
    assert_eq!(row.role_id, "backupOperator");
    assert_eq!(row.role_name, "Backup Operator");
    assert_eq!(row.owner_role_id, "itSecurity");
    assert_eq!(row.role_owner_privilege_id, "vault-read");
    assert_eq!(row.role_owner_permission_group, "readers");
    assert_eq!(row.role_owner_service_name, "Vault");
    assert_eq!(row.service_owner_service_id, "vault");
    // Unset risk scores surface as zero, and the rating follows.
    assert_eq!(row.risk_impact, 0);
    assert_eq!(row.risk_likelihood, 0);
    assert_eq!(row.risk_rating, 0);
}

#[tokio::test]
async fn rows_with_dangling_references_are_dropped() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    built(seed_baseline(&store).await);
    built(
        store
            .insert_grant(grant_input_fixture("ghostRole", "vault-read", "vault-read"))
            .await,
    );

    let rows = built(service.grant_snapshots_at(Utc::now()).await);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].role_id, "backupOperator");
}

#[tokio::test]
async fn snapshot_rows_are_ordered_by_role_name_then_grant_id() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    built(seed_baseline(&store).await);
    built(
        store
            .insert_grant(grant_input_fixture("backupOperator", "vault-admin", "vault-admin"))
            .await,
    );
    built(
        store
            .insert_grant(grant_input_fixture("itSecurity", "vault-admin", "vault-admin"))
            .await,
    );

    let rows = built(service.grant_snapshots_at(Utc::now()).await);
    let order: Vec<(String, i64)> = rows
        .iter()
        .map(|row| (row.role_name.clone(), row.grant_id))
        .collect();
    assert_eq!(
        order,
        vec![
            ("Backup Operator".to_owned(), 1),
            ("Backup Operator".to_owned(), 2),
            ("IT Security".to_owned(), 3),
        ]
    );
}

#[tokio::test]
async fn unchanged_interval_yields_an_empty_delta() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    built(seed_baseline(&store).await);
    tick().await;

    let base = Utc::now();
    tick().await;
    let delta = Utc::now();

    assert!(built(service.grant_delta_between(base, delta).await).is_empty());
    assert!(built(service.user_delta_between(base, delta).await).is_empty());
}

#[tokio::test]
async fn certification_flags_carry_no_delta_signal() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    let grant = built(seed_baseline(&store).await);
    tick().await;

    let base = Utc::now();
    tick().await;
    built(store.update_grant(certified_on_both_sides(&grant)).await);
    tick().await;
    let delta = Utc::now();

    // The flags differ between the two instants, but the delta equality
    // deliberately ignores them.
    assert!(!built(service.grant_snapshots_at(base).await)[0].role_owner_is_certified);
    assert!(built(service.grant_snapshots_at(delta).await)[0].role_owner_is_certified);
    assert!(built(service.grant_delta_between(base, delta).await).is_empty());
}

#[tokio::test]
async fn substantive_changes_appear_in_the_delta() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    let grant = built(seed_baseline(&store).await);
    tick().await;

    let base = Utc::now();
    tick().await;

    let mut role_owner = grant.role_owner().clone();
    role_owner.access_justification = "needs nightly restore access".to_owned();
    let mut risk = grant.risk().clone();
    risk.impact = Some(4);
    risk.likelihood = Some(2);
    built(
        store
            .update_grant(grant.with_update(role_owner, grant.service_owner().clone(), risk))
            .await,
    );
    tick().await;
    let delta = Utc::now();

    let changed = built(service.grant_delta_between(base, delta).await);
    assert_eq!(changed.len(), 1);
    assert_eq!(
        changed[0].role_owner_access_justification,
        "needs nightly restore access"
    );
    assert_eq!(changed[0].risk_rating, 8);
}

#[tokio::test]
async fn risk_score_change_alone_appears_in_the_delta() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    let grant = built(seed_baseline(&store).await);
    tick().await;

    let base = Utc::now();
    tick().await;

    let mut risk = grant.risk().clone();
    risk.impact = Some(5);
    risk.likelihood = Some(1);
    built(
        store
            .update_grant(grant.with_update(
                grant.role_owner().clone(),
                grant.service_owner().clone(),
                risk,
            ))
            .await,
    );
    tick().await;
    let delta = Utc::now();

    let changed = built(service.grant_delta_between(base, delta).await);
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].risk_impact, 5);
    assert_eq!(changed[0].risk_likelihood, 1);
    assert_eq!(changed[0].risk_rating, 5);
}

#[tokio::test]
async fn grant_delta_reports_the_later_side() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    built(seed_baseline(&store).await);
    tick().await;

    let base = Utc::now();
    tick().await;
    built(
        store
            .insert_grant(grant_input_fixture("backupOperator", "vault-admin", "vault-admin"))
            .await,
    );
    tick().await;
    let delta = Utc::now();

    // A grant added in the interval is a change; one deleted is not, since
    // role reports answer "what does the role hold now that it did not".
    let added = built(service.grant_delta_between(base, delta).await);
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].role_owner_privilege_id, "vault-admin");

    built(store.delete_grant(GrantId::new(added[0].grant_id)).await);
    tick().await;
    let after_delete = Utc::now();
    assert!(built(service.grant_delta_between(delta, after_delete).await).is_empty());
}

#[tokio::test]
async fn user_delta_reports_the_earlier_side() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    built(seed_baseline(&store).await);
    tick().await;

    let base = Utc::now();
    tick().await;
    built(
        store
            .delete_user(&built(UserId::new("jdoe")))
            .await,
    );
    tick().await;
    let delta = Utc::now();

    // Departed users are the signal; arrivals are not.
    let departed = built(service.user_delta_between(base, delta).await);
    assert_eq!(departed.len(), 1);
    assert_eq!(departed[0].user_id, "jdoe");
}

#[tokio::test]
async fn identical_range_endpoints_are_rejected_and_reversed_ones_swapped() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    built(seed_baseline(&store).await);
    tick().await;

    let base = Utc::now();
    tick().await;
    built(
        store
            .insert_grant(grant_input_fixture("backupOperator", "vault-admin", "vault-admin"))
            .await,
    );
    tick().await;
    let delta = Utc::now();

    assert!(matches!(
        service.grant_delta_between(base, base).await,
        Err(AppError::Validation(_))
    ));

    let forward = built(service.grant_delta_between(base, delta).await);
    let reversed = built(service.grant_delta_between(delta, base).await);
    assert_eq!(forward.len(), reversed.len());
}

#[tokio::test]
async fn disagreements_keep_only_conflicting_rows() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    built(seed_baseline(&store).await);
    built(
        store
            .insert_grant(grant_input_fixture("itSecurity", "vault-admin", "vault-read"))
            .await,
    );

    let rows = built(service.grant_snapshots_at(Utc::now()).await);
    let conflicts = service.disagreements(rows);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].role_id, "itSecurity");
}

#[tokio::test]
async fn role_detail_nests_the_privilege_menu() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    built(seed_baseline(&store).await);

    let role_id = built(RoleId::new("backupOperator"));
    let detail = built(service.role_detail_at(&role_id, Utc::now()).await);

    assert_eq!(detail.role_name, "Backup Operator");
    assert_eq!(detail.service_privs.len(), 1);

    let view = &detail.service_privs[0];
    assert_eq!(view.service_name, "Vault");
    assert_eq!(view.privilege.privilege_id, "vault-read");
    // The menu lists every privilege of the service, ordered by group.
    let menu: Vec<&str> = view
        .available_privileges
        .iter()
        .map(|entry| entry.privilege_id.as_str())
        .collect();
    assert_eq!(menu, vec!["vault-admin", "vault-read"]);
    // No closed cycle exists yet, so there is no previous choice to show.
    assert!(view.previous_privilege.is_none());
}

#[tokio::test]
async fn role_detail_recalls_the_previous_cycle_choice() {
    let store = Arc::new(FakeStore::new());
    let cycles = CycleService::new(store.clone(), store.clone(), store.clone());
    let service = SnapshotService::new(store.clone(), cycles.clone());
    built(cycles.ensure_initial_cycle().await);
    let grant = built(seed_baseline(&store).await);
    tick().await;

    built(cycles.start_new_cycle("Q3 review", true).await);
    tick().await;

    // The role owner re-points the grant at a different privilege in the
    // new cycle; the detail view still recalls the old one.
    let mut role_owner = grant.role_owner().clone();
    role_owner.privilege_id = built(PrivilegeId::new("vault-admin"));
    built(
        store
            .update_grant(grant.with_update(
                role_owner,
                grant.service_owner().clone(),
                grant.risk().clone(),
            ))
            .await,
    );

    let role_id = built(RoleId::new("backupOperator"));
    let detail = built(service.role_detail_at(&role_id, Utc::now()).await);
    let view = &detail.service_privs[0];
    assert_eq!(view.privilege.privilege_id, "vault-admin");
    let Some(previous) = &view.previous_privilege else {
        panic!("previous privilege should be recalled");
    };
    assert_eq!(previous.privilege_id, "vault-read");
}

#[tokio::test]
async fn role_detail_for_unknown_role_is_not_found() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    built(seed_baseline(&store).await);

    let role_id = built(RoleId::new("ghostRole"));
    assert!(matches!(
        service.role_detail_at(&role_id, Utc::now()).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn risk_assessment_report_filters_to_the_role() {
    let store = Arc::new(FakeStore::new());
    let cycles = CycleService::new(store.clone(), store.clone(), store.clone());
    let service = SnapshotService::new(store.clone(), cycles.clone());
    built(cycles.ensure_initial_cycle().await);
    built(seed_baseline(&store).await);
    built(
        store
            .insert_grant(grant_input_fixture("itSecurity", "vault-admin", "vault-admin"))
            .await,
    );

    let role_id = built(RoleId::new("backupOperator"));
    let report = built(service.role_risk_assessment_at(&role_id, 0).await);
    assert_eq!(report.role.id(), &role_id);
    assert_eq!(report.grants.len(), 1);
    assert_eq!(report.grants[0].role_id, "backupOperator");
}

#[tokio::test]
async fn new_role_fixture_trims_nothing_from_history() {
    let store = Arc::new(FakeStore::new());
    let service = service_over(&store);
    built(seed_baseline(&store).await);
    tick().await;
    let first = Utc::now();
    tick().await;

    built(
        store
            .insert_role(role_fixture("dbAdmin", "DB Admin", Some("itSecurity")))
            .await,
    );
    built(
        store
            .insert_privilege(privilege_fixture("vault-audit", "vault", "auditors"))
            .await,
    );

    // The earlier instant still reconstructs without the later rows.
    let rows = built(service.grant_snapshots_at(first).await);
    assert_eq!(rows.len(), 1);
    let role_id = built(RoleId::new("backupOperator"));
    let detail = built(service.role_detail_at(&role_id, first).await);
    assert_eq!(detail.service_privs[0].available_privileges.len(), 2);
}
