use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use recert_application::{CycleRepository, DirectoryRepository, GrantRepository, TemporalStore};
use recert_core::{AppError, AppResult};
use recert_domain::{
    CycleId, Grant, GrantId, GrantInput, Privilege, PrivilegeId, RecertCycle, Role, RoleId,
    Service, ServiceId, User, UserId,
};
use tokio::sync::RwLock;

#[derive(Debug)]
struct Version<T> {
    effective_from: DateTime<Utc>,
    effective_to: Option<DateTime<Utc>>,
    row: T,
}

/// Append-only version log mirroring the Postgres `*_versions` tables.
#[derive(Debug)]
struct VersionLog<T> {
    versions: Vec<Version<T>>,
}

impl<T> Default for VersionLog<T> {
    fn default() -> Self {
        Self {
            versions: Vec::new(),
        }
    }
}

impl<T: Clone> VersionLog<T> {
    fn current(&self) -> Vec<T> {
        self.versions
            .iter()
            .filter(|version| version.effective_to.is_none())
            .map(|version| version.row.clone())
            .collect()
    }

    fn as_of(&self, at: DateTime<Utc>) -> Vec<T> {
        self.versions
            .iter()
            .filter(|version| {
                version.effective_from <= at
                    && version.effective_to.is_none_or(|closed| closed > at)
            })
            .map(|version| version.row.clone())
            .collect()
    }

    fn close(&mut self, at: DateTime<Utc>, mut matches: impl FnMut(&T) -> bool) -> bool {
        let mut closed = false;
        for version in &mut self.versions {
            if version.effective_to.is_none() && matches(&version.row) {
                version.effective_to = Some(at);
                closed = true;
            }
        }
        closed
    }

    fn open(&mut self, at: DateTime<Utc>, row: T) {
        self.versions.push(Version {
            effective_from: at,
            effective_to: None,
            row,
        });
    }
}

/// In-memory implementation of every repository port, backing tests that
/// exercise the application services without a database.
#[derive(Debug, Default)]
pub struct InMemoryRecertRepository {
    users: RwLock<VersionLog<User>>,
    roles: RwLock<VersionLog<Role>>,
    services: RwLock<VersionLog<Service>>,
    privileges: RwLock<VersionLog<Privilege>>,
    grants: RwLock<VersionLog<Grant>>,
    cycles: RwLock<Vec<RecertCycle>>,
    next_grant_id: AtomicI64,
    next_cycle_id: AtomicI64,
}

impl InMemoryRecertRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn grant_pair_conflict(
        existing: &[Grant],
        candidate: &GrantInput,
        updating: Option<GrantId>,
    ) -> Option<AppError> {
        for grant in existing {
            if Some(grant.id()) == updating {
                continue;
            }
            if grant.role_id() != &candidate.role_id {
                continue;
            }
            if grant.role_owner().privilege_id == candidate.role_owner.privilege_id
                || grant.service_owner().privilege_id == candidate.service_owner.privilege_id
            {
                return Some(AppError::Conflict(format!(
                    "role '{}' already links one of the named privileges",
                    candidate.role_id
                )));
            }
        }
        None
    }
}

#[async_trait]
impl DirectoryRepository for InMemoryRecertRepository {
    async fn list_users(&self) -> AppResult<Vec<User>> {
        let mut users = self.users.read().await.current();
        users.sort_by(|left, right| left.id().as_str().cmp(right.id().as_str()));
        Ok(users)
    }

    async fn find_user(&self, id: &UserId) -> AppResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .current()
            .into_iter()
            .find(|user| user.id() == id))
    }

    async fn insert_user(&self, user: User) -> AppResult<()> {
        let mut users = self.users.write().await;
        if users.current().iter().any(|row| row.id() == user.id()) {
            return Err(AppError::Conflict(format!(
                "user '{}' already exists",
                user.id()
            )));
        }
        users.open(Utc::now(), user);
        Ok(())
    }

    async fn update_user(&self, user: User) -> AppResult<()> {
        let mut users = self.users.write().await;
        let now = Utc::now();
        if !users.close(now, |row| row.id() == user.id()) {
            return Err(AppError::NotFound(format!("user '{}' not found", user.id())));
        }
        users.open(now, user);
        Ok(())
    }

    async fn delete_user(&self, id: &UserId) -> AppResult<()> {
        let mut users = self.users.write().await;
        if !users.close(Utc::now(), |row| row.id() == id) {
            return Err(AppError::NotFound(format!("user '{id}' not found")));
        }
        Ok(())
    }

    async fn count_users(&self) -> AppResult<i64> {
        Ok(self.users.read().await.current().len() as i64)
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let mut roles = self.roles.read().await.current();
        roles.sort_by(|left, right| left.id().as_str().cmp(right.id().as_str()));
        Ok(roles)
    }

    async fn find_role(&self, id: &RoleId) -> AppResult<Option<Role>> {
        Ok(self
            .roles
            .read()
            .await
            .current()
            .into_iter()
            .find(|role| role.id() == id))
    }

    async fn insert_role(&self, role: Role) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        if roles.current().iter().any(|row| row.id() == role.id()) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.id()
            )));
        }
        roles.open(Utc::now(), role);
        Ok(())
    }

    async fn update_role(&self, role: Role) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        let now = Utc::now();
        if !roles.close(now, |row| row.id() == role.id()) {
            return Err(AppError::NotFound(format!("role '{}' not found", role.id())));
        }
        roles.open(now, role);
        Ok(())
    }

    async fn delete_role(&self, id: &RoleId) -> AppResult<()> {
        if self
            .users
            .read()
            .await
            .current()
            .iter()
            .any(|user| user.role_id() == id)
        {
            return Err(AppError::ReferentialIntegrity(format!(
                "role '{id}' is still assigned to users"
            )));
        }
        if self
            .services
            .read()
            .await
            .current()
            .iter()
            .any(|service| service.owner_role_id() == id)
        {
            return Err(AppError::ReferentialIntegrity(format!(
                "role '{id}' still owns services"
            )));
        }
        if self
            .roles
            .read()
            .await
            .current()
            .iter()
            .any(|role| role.owner_role_id() == Some(id))
        {
            return Err(AppError::ReferentialIntegrity(format!(
                "role '{id}' still owns roles"
            )));
        }
        if self
            .grants
            .read()
            .await
            .current()
            .iter()
            .any(|grant| grant.role_id() == id)
        {
            return Err(AppError::ReferentialIntegrity(format!(
                "role '{id}' still holds grants"
            )));
        }

        let mut roles = self.roles.write().await;
        if !roles.close(Utc::now(), |row| row.id() == id) {
            return Err(AppError::NotFound(format!("role '{id}' not found")));
        }
        Ok(())
    }

    async fn count_roles(&self) -> AppResult<i64> {
        Ok(self.roles.read().await.current().len() as i64)
    }

    async fn roles_owned_by(&self, id: &RoleId) -> AppResult<Vec<Role>> {
        Ok(self
            .roles
            .read()
            .await
            .current()
            .into_iter()
            .filter(|role| role.owner_role_id() == Some(id))
            .collect())
    }

    async fn services_owned_by(&self, id: &RoleId) -> AppResult<Vec<Service>> {
        Ok(self
            .services
            .read()
            .await
            .current()
            .into_iter()
            .filter(|service| service.owner_role_id() == id)
            .collect())
    }

    async fn list_services(&self) -> AppResult<Vec<Service>> {
        let mut services = self.services.read().await.current();
        services.sort_by(|left, right| left.id().as_str().cmp(right.id().as_str()));
        Ok(services)
    }

    async fn find_service(&self, id: &ServiceId) -> AppResult<Option<Service>> {
        Ok(self
            .services
            .read()
            .await
            .current()
            .into_iter()
            .find(|service| service.id() == id))
    }

    async fn insert_service(&self, service: Service) -> AppResult<()> {
        let mut services = self.services.write().await;
        if services.current().iter().any(|row| row.id() == service.id()) {
            return Err(AppError::Conflict(format!(
                "service '{}' already exists",
                service.id()
            )));
        }
        services.open(Utc::now(), service);
        Ok(())
    }

    async fn update_service(&self, service: Service) -> AppResult<()> {
        let mut services = self.services.write().await;
        let now = Utc::now();
        if !services.close(now, |row| row.id() == service.id()) {
            return Err(AppError::NotFound(format!(
                "service '{}' not found",
                service.id()
            )));
        }
        services.open(now, service);
        Ok(())
    }

    async fn delete_service(&self, id: &ServiceId) -> AppResult<()> {
        if self
            .privileges
            .read()
            .await
            .current()
            .iter()
            .any(|privilege| privilege.service_id() == id)
        {
            return Err(AppError::ReferentialIntegrity(format!(
                "service '{id}' still has privileges"
            )));
        }

        let mut services = self.services.write().await;
        if !services.close(Utc::now(), |row| row.id() == id) {
            return Err(AppError::NotFound(format!("service '{id}' not found")));
        }
        Ok(())
    }

    async fn count_services(&self) -> AppResult<i64> {
        Ok(self.services.read().await.current().len() as i64)
    }

    async fn privileges_for_service(&self, id: &ServiceId) -> AppResult<Vec<Privilege>> {
        let mut privileges: Vec<Privilege> = self
            .privileges
            .read()
            .await
            .current()
            .into_iter()
            .filter(|privilege| privilege.service_id() == id)
            .collect();
        privileges.sort_by(|left, right| {
            left.permission_group()
                .cmp(right.permission_group())
                .then_with(|| left.id().as_str().cmp(right.id().as_str()))
        });
        Ok(privileges)
    }

    async fn list_privileges(&self) -> AppResult<Vec<Privilege>> {
        let mut privileges = self.privileges.read().await.current();
        privileges.sort_by(|left, right| left.id().as_str().cmp(right.id().as_str()));
        Ok(privileges)
    }

    async fn find_privilege(&self, id: &PrivilegeId) -> AppResult<Option<Privilege>> {
        Ok(self
            .privileges
            .read()
            .await
            .current()
            .into_iter()
            .find(|privilege| privilege.id() == id))
    }

    async fn insert_privilege(&self, privilege: Privilege) -> AppResult<()> {
        let mut privileges = self.privileges.write().await;
        if privileges
            .current()
            .iter()
            .any(|row| row.id() == privilege.id())
        {
            return Err(AppError::Conflict(format!(
                "privilege '{}' already exists",
                privilege.id()
            )));
        }
        privileges.open(Utc::now(), privilege);
        Ok(())
    }

    async fn update_privilege(&self, privilege: Privilege) -> AppResult<()> {
        let mut privileges = self.privileges.write().await;
        let now = Utc::now();
        if !privileges.close(now, |row| row.id() == privilege.id()) {
            return Err(AppError::NotFound(format!(
                "privilege '{}' not found",
                privilege.id()
            )));
        }
        privileges.open(now, privilege);
        Ok(())
    }

    async fn delete_privilege(&self, id: &PrivilegeId) -> AppResult<()> {
        if self.grants.read().await.current().iter().any(|grant| {
            &grant.role_owner().privilege_id == id || &grant.service_owner().privilege_id == id
        }) {
            return Err(AppError::ReferentialIntegrity(format!(
                "privilege '{id}' is still granted"
            )));
        }

        let mut privileges = self.privileges.write().await;
        if !privileges.close(Utc::now(), |row| row.id() == id) {
            return Err(AppError::NotFound(format!("privilege '{id}' not found")));
        }
        Ok(())
    }

    async fn count_privileges(&self) -> AppResult<i64> {
        Ok(self.privileges.read().await.current().len() as i64)
    }
}

#[async_trait]
impl GrantRepository for InMemoryRecertRepository {
    async fn list_grants(&self) -> AppResult<Vec<Grant>> {
        let mut grants = self.grants.read().await.current();
        grants.sort_by_key(Grant::id);
        Ok(grants)
    }

    async fn grants_for_role(&self, role_id: &RoleId) -> AppResult<Vec<Grant>> {
        let mut grants: Vec<Grant> = self
            .grants
            .read()
            .await
            .current()
            .into_iter()
            .filter(|grant| grant.role_id() == role_id)
            .collect();
        grants.sort_by_key(Grant::id);
        Ok(grants)
    }

    async fn find_grant(&self, id: GrantId) -> AppResult<Option<Grant>> {
        Ok(self
            .grants
            .read()
            .await
            .current()
            .into_iter()
            .find(|grant| grant.id() == id))
    }

    async fn insert_grant(&self, input: GrantInput) -> AppResult<Grant> {
        let mut grants = self.grants.write().await;
        if let Some(conflict) = Self::grant_pair_conflict(&grants.current(), &input, None) {
            return Err(conflict);
        }

        let id = self.next_grant_id.fetch_add(1, Ordering::SeqCst) + 1;
        let grant = Grant::new(GrantId::new(id), input)?;
        grants.open(Utc::now(), grant.clone());
        Ok(grant)
    }

    async fn update_grant(&self, grant: Grant) -> AppResult<Grant> {
        let mut grants = self.grants.write().await;
        let input = GrantInput {
            role_id: grant.role_id().clone(),
            role_owner: grant.role_owner().clone(),
            service_owner: grant.service_owner().clone(),
            risk: grant.risk().clone(),
        };
        if let Some(conflict) =
            Self::grant_pair_conflict(&grants.current(), &input, Some(grant.id()))
        {
            return Err(conflict);
        }

        let now = Utc::now();
        if !grants.close(now, |row| row.id() == grant.id()) {
            return Err(AppError::NotFound(format!(
                "grant '{}' not found",
                grant.id()
            )));
        }
        grants.open(now, grant.clone());
        Ok(grant)
    }

    async fn delete_grant(&self, id: GrantId) -> AppResult<()> {
        let mut grants = self.grants.write().await;
        if !grants.close(Utc::now(), |row| row.id() == id) {
            return Err(AppError::NotFound(format!("grant '{id}' not found")));
        }
        Ok(())
    }

    async fn count_grants(&self) -> AppResult<i64> {
        Ok(self.grants.read().await.current().len() as i64)
    }
}

#[async_trait]
impl CycleRepository for InMemoryRecertRepository {
    async fn list_cycles(&self) -> AppResult<Vec<RecertCycle>> {
        let mut cycles = self.cycles.read().await.clone();
        cycles.sort_by(|left, right| right.id().cmp(&left.id()));
        Ok(cycles)
    }

    async fn find_cycle(&self, id: CycleId) -> AppResult<Option<RecertCycle>> {
        Ok(self
            .cycles
            .read()
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
        let id = self.next_cycle_id.fetch_add(1, Ordering::SeqCst) + 1;
        let cycle = RecertCycle::new(CycleId::new(id), title, started_at, None, enabled)?;
        self.cycles.write().await.push(cycle.clone());
        Ok(cycle)
    }

    async fn update_cycle(&self, cycle: RecertCycle) -> AppResult<()> {
        let mut cycles = self.cycles.write().await;
        let Some(slot) = cycles.iter_mut().find(|row| row.id() == cycle.id()) else {
            return Err(AppError::NotFound(format!(
                "cycle '{}' not found",
                cycle.id()
            )));
        };
        *slot = cycle;
        Ok(())
    }

    async fn delete_cycle(&self, id: CycleId) -> AppResult<()> {
        let mut cycles = self.cycles.write().await;
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
            let mut cycles = self.cycles.write().await;
            for cycle in cycles.iter_mut() {
                if cycle.is_open() {
                    *cycle = cycle.closed_at(now);
                }
            }
        }

        {
            let mut grants = self.grants.write().await;
            let resets: Vec<Grant> = grants.current().iter().map(Grant::with_flags_reset).collect();
            grants.close(after_close, |_| true);
            for reset in resets {
                grants.open(after_close, reset);
            }
        }

        let id = self.next_cycle_id.fetch_add(1, Ordering::SeqCst) + 1;
        let cycle = RecertCycle::new(CycleId::new(id), title, after_close, None, enabled)?;
        self.cycles.write().await.push(cycle.clone());
        Ok(cycle)
    }
}

#[async_trait]
impl TemporalStore for InMemoryRecertRepository {
    async fn users_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<User>> {
        Ok(self.users.read().await.as_of(at))
    }

    async fn roles_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<Role>> {
        Ok(self.roles.read().await.as_of(at))
    }

    async fn services_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<Service>> {
        Ok(self.services.read().await.as_of(at))
    }

    async fn privileges_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<Privilege>> {
        Ok(self.privileges.read().await.as_of(at))
    }

    async fn grants_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<Grant>> {
        Ok(self.grants.read().await.as_of(at))
    }
}
