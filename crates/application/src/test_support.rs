//! Shared in-memory fake implementing every repository port for service
//! tests. Versions are kept in an append-only log so the temporal port can
//! be exercised for real.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use recert_core::{AppError, AppResult};
use recert_domain::{
    CycleId, Grant, GrantId, GrantInput, OwnerAttestation, Privilege, PrivilegeId, RecertCycle,
    RiskAssessment, Role, RoleId, Service, ServiceId, User, UserId,
};
use tokio::sync::Mutex;

use crate::cycle_ports::CycleRepository;
use crate::directory_ports::DirectoryRepository;
use crate::grant_ports::GrantRepository;
use crate::temporal_ports::TemporalStore;

pub struct Versioned<T> {
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub row: T,
}

fn current<T: Clone>(log: &[Versioned<T>]) -> Vec<T> {
    log.iter()
        .filter(|version| version.effective_to.is_none())
        .map(|version| version.row.clone())
        .collect()
}

fn as_of<T: Clone>(log: &[Versioned<T>], at: DateTime<Utc>) -> Vec<T> {
    log.iter()
        .filter(|version| {
            version.effective_from <= at
                && version.effective_to.is_none_or(|closed| closed > at)
        })
        .map(|version| version.row.clone())
        .collect()
}

fn close_current<T>(
    log: &mut Vec<Versioned<T>>,
    now: DateTime<Utc>,
    mut matches: impl FnMut(&T) -> bool,
) -> bool {
    let mut closed = false;
    for version in log.iter_mut() {
        if version.effective_to.is_none() && matches(&version.row) {
            version.effective_to = Some(now);
            closed = true;
        }
    }
    closed
}

fn push_version<T>(log: &mut Vec<Versioned<T>>, now: DateTime<Utc>, row: T) {
    log.push(Versioned {
        effective_from: now,
        effective_to: None,
        row,
    });
}

#[derive(Default)]
pub struct FakeStore {
    pub users: Mutex<Vec<Versioned<User>>>,
    pub roles: Mutex<Vec<Versioned<Role>>>,
    pub services: Mutex<Vec<Versioned<Service>>>,
    pub privileges: Mutex<Vec<Versioned<Privilege>>>,
    pub grants: Mutex<Vec<Versioned<Grant>>>,
    pub cycles: Mutex<Vec<RecertCycle>>,
    next_grant_id: Mutex<i64>,
    next_cycle_id: Mutex<i64>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DirectoryRepository for FakeStore {
    async fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(current(&self.users.lock().await))
    }

    async fn find_user(&self, id: &UserId) -> AppResult<Option<User>> {
        Ok(current(&self.users.lock().await)
            .into_iter()
            .find(|user| user.id() == id))
    }

    async fn insert_user(&self, user: User) -> AppResult<()> {
        let mut users = self.users.lock().await;
        if current(&users).iter().any(|row| row.id() == user.id()) {
            return Err(AppError::Conflict(format!(
                "user '{}' already exists",
                user.id()
            )));
        }
        push_version(&mut users, Utc::now(), user);
        Ok(())
    }

    async fn update_user(&self, user: User) -> AppResult<()> {
        let mut users = self.users.lock().await;
        let now = Utc::now();
        if !close_current(&mut users, now, |row: &User| row.id() == user.id()) {
            return Err(AppError::NotFound(format!("user '{}' not found", user.id())));
        }
        push_version(&mut users, now, user);
        Ok(())
    }

    async fn delete_user(&self, id: &UserId) -> AppResult<()> {
        let mut users = self.users.lock().await;
        if !close_current(&mut users, Utc::now(), |row: &User| row.id() == id) {
            return Err(AppError::NotFound(format!("user '{id}' not found")));
        }
        Ok(())
    }

    async fn count_users(&self) -> AppResult<i64> {
        Ok(current(&self.users.lock().await).len() as i64)
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        Ok(current(&self.roles.lock().await))
    }

    async fn find_role(&self, id: &RoleId) -> AppResult<Option<Role>> {
        Ok(current(&self.roles.lock().await)
            .into_iter()
            .find(|role| role.id() == id))
    }

    async fn insert_role(&self, role: Role) -> AppResult<()> {
        let mut roles = self.roles.lock().await;
        if current(&roles).iter().any(|row| row.id() == role.id()) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.id()
            )));
        }
        push_version(&mut roles, Utc::now(), role);
        Ok(())
    }

    async fn update_role(&self, role: Role) -> AppResult<()> {
        let mut roles = self.roles.lock().await;
        let now = Utc::now();
        if !close_current(&mut roles, now, |row: &Role| row.id() == role.id()) {
            return Err(AppError::NotFound(format!("role '{}' not found", role.id())));
        }
        push_version(&mut roles, now, role);
        Ok(())
    }

    async fn delete_role(&self, id: &RoleId) -> AppResult<()> {
        if current(&self.users.lock().await)
            .iter()
            .any(|user| user.role_id() == id)
        {
            return Err(AppError::ReferentialIntegrity(format!(
                "role '{id}' is still assigned to users"
            )));
        }
        if current(&self.services.lock().await)
            .iter()
            .any(|service| service.owner_role_id() == id)
        {
            return Err(AppError::ReferentialIntegrity(format!(
                "role '{id}' still owns services"
            )));
        }
        if current(&self.roles.lock().await)
            .iter()
            .any(|role| role.owner_role_id() == Some(id))
        {
            return Err(AppError::ReferentialIntegrity(format!(
                "role '{id}' still owns roles"
            )));
        }
        if current(&self.grants.lock().await)
            .iter()
            .any(|grant| grant.role_id() == id)
        {
            return Err(AppError::ReferentialIntegrity(format!(
                "role '{id}' still holds grants"
            )));
        }

        let mut roles = self.roles.lock().await;
        if !close_current(&mut roles, Utc::now(), |row: &Role| row.id() == id) {
            return Err(AppError::NotFound(format!("role '{id}' not found")));
        }
        Ok(())
    }

    async fn count_roles(&self) -> AppResult<i64> {
        Ok(current(&self.roles.lock().await).len() as i64)
    }

    async fn roles_owned_by(&self, id: &RoleId) -> AppResult<Vec<Role>> {
        Ok(current(&self.roles.lock().await)
            .into_iter()
            .filter(|role| role.owner_role_id() == Some(id))
            .collect())
    }

    async fn services_owned_by(&self, id: &RoleId) -> AppResult<Vec<Service>> {
        Ok(current(&self.services.lock().await)
            .into_iter()
            .filter(|service| service.owner_role_id() == id)
            .collect())
    }

    async fn list_services(&self) -> AppResult<Vec<Service>> {
        Ok(current(&self.services.lock().await))
    }

    async fn find_service(&self, id: &ServiceId) -> AppResult<Option<Service>> {
        Ok(current(&self.services.lock().await)
            .into_iter()
            .find(|service| service.id() == id))
    }

    async fn insert_service(&self, service: Service) -> AppResult<()> {
        let mut services = self.services.lock().await;
        if current(&services).iter().any(|row| row.id() == service.id()) {
            return Err(AppError::Conflict(format!(
                "service '{}' already exists",
                service.id()
            )));
        }
        push_version(&mut services, Utc::now(), service);
        Ok(())
    }

    async fn update_service(&self, service: Service) -> AppResult<()> {
        let mut services = self.services.lock().await;
        let now = Utc::now();
        if !close_current(&mut services, now, |row: &Service| row.id() == service.id()) {
            return Err(AppError::NotFound(format!(
                "service '{}' not found",
                service.id()
            )));
        }
        push_version(&mut services, now, service);
        Ok(())
    }

    async fn delete_service(&self, id: &ServiceId) -> AppResult<()> {
        if current(&self.privileges.lock().await)
            .iter()
            .any(|privilege| privilege.service_id() == id)
        {
            return Err(AppError::ReferentialIntegrity(format!(
                "service '{id}' still has privileges"
            )));
        }

        let mut services = self.services.lock().await;
        if !close_current(&mut services, Utc::now(), |row: &Service| row.id() == id) {
            return Err(AppError::NotFound(format!("service '{id}' not found")));
        }
        Ok(())
    }

    async fn count_services(&self) -> AppResult<i64> {
        Ok(current(&self.services.lock().await).len() as i64)
    }

    async fn privileges_for_service(&self, id: &ServiceId) -> AppResult<Vec<Privilege>> {
        Ok(current(&self.privileges.lock().await)
            .into_iter()
            .filter(|privilege| privilege.service_id() == id)
            .collect())
    }

    async fn list_privileges(&self) -> AppResult<Vec<Privilege>> {
        Ok(current(&self.privileges.lock().await))
    }

    async fn find_privilege(&self, id: &PrivilegeId) -> AppResult<Option<Privilege>> {
        Ok(current(&self.privileges.lock().await)
            .into_iter()
            .find(|privilege| privilege.id() == id))
    }

    async fn insert_privilege(&self, privilege: Privilege) -> AppResult<()> {
        let mut privileges = self.privileges.lock().await;
        if current(&privileges)
            .iter()
            .any(|row| row.id() == privilege.id())
        {
            return Err(AppError::Conflict(format!(
                "privilege '{}' already exists",
                privilege.id()
            )));
        }
        push_version(&mut privileges, Utc::now(), privilege);
        Ok(())
    }

    async fn update_privilege(&self, privilege: Privilege) -> AppResult<()> {
        let mut privileges = self.privileges.lock().await;
        let now = Utc::now();
        if !close_current(&mut privileges, now, |row: &Privilege| {
            row.id() == privilege.id()
        }) {
            return Err(AppError::NotFound(format!(
                "privilege '{}' not found",
                privilege.id()
            )));
        }
        push_version(&mut privileges, now, privilege);
        Ok(())
    }

    async fn delete_privilege(&self, id: &PrivilegeId) -> AppResult<()> {
        if current(&self.grants.lock().await).iter().any(|grant| {
            &grant.role_owner().privilege_id == id || &grant.service_owner().privilege_id == id
        }) {
            return Err(AppError::ReferentialIntegrity(format!(
                "privilege '{id}' is still granted"
            )));
        }

        let mut privileges = self.privileges.lock().await;
        if !close_current(&mut privileges, Utc::now(), |row: &Privilege| row.id() == id) {
            return Err(AppError::NotFound(format!("privilege '{id}' not found")));
        }
        Ok(())
    }

    async fn count_privileges(&self) -> AppResult<i64> {
        Ok(current(&self.privileges.lock().await).len() as i64)
    }
}

#[async_trait]
impl GrantRepository for FakeStore {
    async fn list_grants(&self) -> AppResult<Vec<Grant>> {
        Ok(current(&self.grants.lock().await))
    }

    async fn grants_for_role(&self, role_id: &RoleId) -> AppResult<Vec<Grant>> {
        Ok(current(&self.grants.lock().await)
            .into_iter()
            .filter(|grant| grant.role_id() == role_id)
            .collect())
    }

    async fn find_grant(&self, id: GrantId) -> AppResult<Option<Grant>> {
        Ok(current(&self.grants.lock().await)
            .into_iter()
            .find(|grant| grant.id() == id))
    }

    async fn insert_grant(&self, input: GrantInput) -> AppResult<Grant> {
        let mut grants = self.grants.lock().await;
        check_grant_uniqueness(&current(&grants), &input, None)?;

        let mut next_id = self.next_grant_id.lock().await;
        *next_id += 1;
        let grant = Grant::new(GrantId::new(*next_id), input)?;
        push_version(&mut grants, Utc::now(), grant.clone());
        Ok(grant)
    }

    async fn update_grant(&self, grant: Grant) -> AppResult<Grant> {
        let mut grants = self.grants.lock().await;
        let input = GrantInput {
            role_id: grant.role_id().clone(),
            role_owner: grant.role_owner().clone(),
            service_owner: grant.service_owner().clone(),
            risk: grant.risk().clone(),
        };
        check_grant_uniqueness(&current(&grants), &input, Some(grant.id()))?;

        let now = Utc::now();
        if !close_current(&mut grants, now, |row: &Grant| row.id() == grant.id()) {
            return Err(AppError::NotFound(format!("grant '{}' not found", grant.id())));
        }
        push_version(&mut grants, now, grant.clone());
        Ok(grant)
    }

    async fn delete_grant(&self, id: GrantId) -> AppResult<()> {
        let mut grants = self.grants.lock().await;
        if !close_current(&mut grants, Utc::now(), |row: &Grant| row.id() == id) {
            return Err(AppError::NotFound(format!("grant '{id}' not found")));
        }
        Ok(())
    }

    async fn count_grants(&self) -> AppResult<i64> {
        Ok(current(&self.grants.lock().await).len() as i64)
    }
}

fn check_grant_uniqueness(
    existing: &[Grant],
    input: &GrantInput,
    updating: Option<GrantId>,
) -> AppResult<()> {
    for grant in existing {
        if Some(grant.id()) == updating {
            continue;
        }
        if grant.role_id() == &input.role_id
            && grant.role_owner().privilege_id == input.role_owner.privilege_id
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already links role-owner privilege '{}'",
                input.role_id, input.role_owner.privilege_id
            )));
        }
        if grant.role_id() == &input.role_id
            && grant.service_owner().privilege_id == input.service_owner.privilege_id
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already links service-owner privilege '{}'",
                input.role_id, input.service_owner.privilege_id
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl CycleRepository for FakeStore {
    async fn list_cycles(&self) -> AppResult<Vec<RecertCycle>> {
        let mut cycles = self.cycles.lock().await.clone();
        cycles.sort_by(|left, right| right.id().cmp(&left.id()));
        Ok(cycles)
    }

    async fn find_cycle(&self, id: CycleId) -> AppResult<Option<RecertCycle>> {
        Ok(self
            .cycles
            .lock()
            .await
            .iter()
            .find(|cycle| cycle.id() == id)
            .cloned())
    }

    async fn latest_cycle(&self) -> AppResult<Option<RecertCycle>> {
        Ok(self.list_cycles().await?.into_iter().next())
    }

    async fn insert_cycle(
        &self,
        title: &str,
        enabled: bool,
        started_at: DateTime<Utc>,
    ) -> AppResult<RecertCycle> {
        let mut next_id = self.next_cycle_id.lock().await;
        *next_id += 1;
        let cycle = RecertCycle::new(CycleId::new(*next_id), title, started_at, None, enabled)?;
        self.cycles.lock().await.push(cycle.clone());
        Ok(cycle)
    }

    async fn update_cycle(&self, cycle: RecertCycle) -> AppResult<()> {
        let mut cycles = self.cycles.lock().await;
        let Some(slot) = cycles.iter_mut().find(|row| row.id() == cycle.id()) else {
            return Err(AppError::NotFound(format!("cycle '{}' not found", cycle.id())));
        };
        *slot = cycle;
        Ok(())
    }

    async fn delete_cycle(&self, id: CycleId) -> AppResult<()> {
        let mut cycles = self.cycles.lock().await;
        let before = cycles.len();
        cycles.retain(|cycle| cycle.id() != id);
        if cycles.len() == before {
            return Err(AppError::NotFound(format!("cycle '{id}' not found")));
        }
        Ok(())
    }

    async fn start_new_cycle(
        &self,
        title: &str,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> AppResult<RecertCycle> {
        // The flag resets and the new cycle land one tick after the close so
        // as-of reads at the closed boundary still see the pre-reset flags.
        let after_close = now + Duration::microseconds(1);

        {
            let mut cycles = self.cycles.lock().await;
            if let Some(open) = cycles.iter_mut().max_by_key(|cycle| cycle.id()) {
                *open = open.closed_at(now);
            }
        }

        {
            let mut grants = self.grants.lock().await;
            let resets: Vec<Grant> = current(&grants)
                .iter()
                .map(Grant::with_flags_reset)
                .collect();
            for reset in resets {
                close_current(&mut grants, after_close, |row: &Grant| row.id() == reset.id());
                push_version(&mut grants, after_close, reset);
            }
        }

        let mut next_id = self.next_cycle_id.lock().await;
        *next_id += 1;
        let cycle = RecertCycle::new(CycleId::new(*next_id), title, after_close, None, enabled)?;
        self.cycles.lock().await.push(cycle.clone());
        Ok(cycle)
    }
}

/// Unwraps a fixture result, panicking with the error on failure. Test
/// fixtures are built from literals, so a failure is a broken test.
pub fn built<T>(result: AppResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => panic!("fixture: {error}"),
    }
}

pub fn role_fixture(id: &str, name: &str, owner: Option<&str>) -> Role {
    let owner = owner.map(|owner| built(RoleId::new(owner)));
    built(Role::new(id, name, format!("{name} role"), owner))
}

pub fn service_fixture(id: &str, name: &str, owner_role: &str) -> Service {
    built(Service::new(
        id,
        name,
        format!("{name} service"),
        built(RoleId::new(owner_role)),
    ))
}

pub fn privilege_fixture(id: &str, service: &str, permission_group: &str) -> Privilege {
    built(Privilege::new(
        id,
        built(ServiceId::new(service)),
        permission_group,
        format!("{permission_group} access"),
        None,
    ))
}

pub fn user_fixture(id: &str, full_name: &str, role: &str) -> User {
    built(User::new(id, full_name, built(RoleId::new(role)), None, None))
}

pub fn grant_input_fixture(
    role: &str,
    role_owner_priv: &str,
    service_owner_priv: &str,
) -> GrantInput {
    GrantInput {
        role_id: built(RoleId::new(role)),
        role_owner: attestation(role_owner_priv),
        service_owner: attestation(service_owner_priv),
        risk: RiskAssessment::default(),
    }
}

pub fn attestation(privilege: &str) -> OwnerAttestation {
    OwnerAttestation::uncertified(built(PrivilegeId::new(privilege)))
}

/// Seeds one row per population: an owner role, an owned role, a service
/// with two privileges, one grant and one user. Returns the grant.
pub async fn seed_baseline(store: &FakeStore) -> AppResult<Grant> {
    store
        .insert_role(role_fixture("itSecurity", "IT Security", None))
        .await?;
    store
        .insert_role(role_fixture("backupOperator", "Backup Operator", Some("itSecurity")))
        .await?;
    store
        .insert_service(service_fixture("vault", "Vault", "itSecurity"))
        .await?;
    store
        .insert_privilege(privilege_fixture("vault-read", "vault", "readers"))
        .await?;
    store
        .insert_privilege(privilege_fixture("vault-admin", "vault", "admins"))
        .await?;
    store
        .insert_user(user_fixture("jdoe", "Jo Doe", "backupOperator"))
        .await?;
    store
        .insert_grant(grant_input_fixture("backupOperator", "vault-read", "vault-read"))
        .await
}

#[async_trait]
impl TemporalStore for FakeStore {
    async fn users_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<User>> {
        Ok(as_of(&self.users.lock().await, at))
    }

    async fn roles_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<Role>> {
        Ok(as_of(&self.roles.lock().await, at))
    }

    async fn services_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<Service>> {
        Ok(as_of(&self.services.lock().await, at))
    }

    async fn privileges_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<Privilege>> {
        Ok(as_of(&self.privileges.lock().await, at))
    }

    async fn grants_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<Grant>> {
        Ok(as_of(&self.grants.lock().await, at))
    }
}
