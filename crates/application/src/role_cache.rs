//! Process-local cache of role definitions and per-user assignments.
//!
//! Both parts expire after a TTL and are patched in place by [`RoleEvent`]s.
//! Snapshots are handed out as `Arc`s and replaced on write, so readers never
//! observe a partially applied event. Events for entries that are not cached
//! are dropped; the next read loads fresh data.
//!
//! Loads run without holding a lock. A load that overlaps an applied event is
//! returned to its caller but not cached.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rolegate_core::AppResult;
use rolegate_domain::{Role, RoleAssignment, UserId};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::role_ports::{RoleEvent, RoleRepository};

/// Lifetimes of cached role data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleCacheConfig {
    /// Lifetime of the role snapshot.
    pub roles_ttl: Duration,
    /// Lifetime of one user's assignment list.
    pub assignments_ttl: Duration,
}

impl RoleCacheConfig {
    /// Uses the same lifetime for both parts.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            roles_ttl: ttl,
            assignments_ttl: ttl,
        }
    }
}

impl Default for RoleCacheConfig {
    fn default() -> Self {
        Self::with_ttl(Duration::from_secs(60 * 60))
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: Arc<T>,
    expires_at: Instant,
}

impl<T> CacheEntry<T> {
    fn new(value: T, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value: Arc::new(value),
            expires_at: now.checked_add(ttl).unwrap_or(now),
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Cached slots plus a counter bumped by every event applied to them.
#[derive(Debug, Default)]
struct Versioned<T> {
    slots: T,
    version: u64,
}

/// Cache of all roles and of each user's raw assignments.
pub struct RoleCache {
    repository: Arc<dyn RoleRepository>,
    config: RoleCacheConfig,
    roles: RwLock<Versioned<Option<CacheEntry<Vec<Role>>>>>,
    assignments: RwLock<Versioned<HashMap<UserId, CacheEntry<Vec<RoleAssignment>>>>>,
}

impl RoleCache {
    /// Creates an empty cache backed by `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn RoleRepository>, config: RoleCacheConfig) -> Self {
        Self {
            repository,
            config,
            roles: RwLock::new(Versioned::default()),
            assignments: RwLock::new(Versioned::default()),
        }
    }

    /// Returns the cache configuration.
    #[must_use]
    pub fn config(&self) -> RoleCacheConfig {
        self.config
    }

    /// Returns all roles, loading them when the snapshot is cold.
    pub async fn roles(&self) -> AppResult<Arc<Vec<Role>>> {
        let version = {
            let roles = self.roles.read().await;
            if let Some(entry) = roles.slots.as_ref()
                && entry.is_fresh(Instant::now())
            {
                return Ok(Arc::clone(&entry.value));
            }
            roles.version
        };

        let loaded = self.repository.list_roles().await?;
        debug!(roles = loaded.len(), "loaded role snapshot");

        let mut roles = self.roles.write().await;
        if let Some(entry) = roles.slots.as_ref()
            && entry.is_fresh(Instant::now())
        {
            return Ok(Arc::clone(&entry.value));
        }

        let entry = CacheEntry::new(loaded, self.config.roles_ttl);
        let value = Arc::clone(&entry.value);
        if roles.version == version {
            roles.slots = Some(entry);
        }

        Ok(value)
    }

    /// Returns the raw assignments of one user, expired rows included.
    pub async fn user_assignments(&self, user_id: UserId) -> AppResult<Arc<Vec<RoleAssignment>>> {
        let version = {
            let assignments = self.assignments.read().await;
            if let Some(entry) = assignments.slots.get(&user_id)
                && entry.is_fresh(Instant::now())
            {
                return Ok(Arc::clone(&entry.value));
            }
            assignments.version
        };

        let loaded = self.repository.list_assignments_for_user(user_id).await?;

        let mut assignments = self.assignments.write().await;
        if let Some(entry) = assignments.slots.get(&user_id)
            && entry.is_fresh(Instant::now())
        {
            return Ok(Arc::clone(&entry.value));
        }

        let entry = CacheEntry::new(loaded, self.config.assignments_ttl);
        let value = Arc::clone(&entry.value);
        if assignments.version == version {
            assignments.slots.insert(user_id, entry);
        }

        Ok(value)
    }

    /// Applies one event by id. Applying the same event twice is a no-op.
    pub async fn apply(&self, event: &RoleEvent) {
        match event {
            RoleEvent::RoleCreated(role) | RoleEvent::RoleUpdated(role) => {
                let mut roles = self.roles.write().await;
                roles.version += 1;
                let Some(entry) = roles.slots.as_mut() else {
                    return;
                };

                let current = entry.value.iter().position(|cached| cached.id == role.id);
                match (current, event) {
                    (Some(index), _) => {
                        if entry.value[index].updated_at > role.updated_at {
                            debug!(role_id = %role.id, "ignored stale role update");
                            return;
                        }
                        Arc::make_mut(&mut entry.value)[index] = role.clone();
                    }
                    (None, RoleEvent::RoleCreated(_)) => {
                        Arc::make_mut(&mut entry.value).push(role.clone());
                    }
                    (None, _) => return,
                }
                debug!(role_id = %role.id, event = event.as_str(), "applied role event");
            }
            RoleEvent::RoleDeleted(role) => {
                let mut roles = self.roles.write().await;
                roles.version += 1;
                if let Some(entry) = roles.slots.as_mut()
                    && entry.value.iter().any(|cached| cached.id == role.id)
                {
                    Arc::make_mut(&mut entry.value).retain(|cached| cached.id != role.id);
                    debug!(role_id = %role.id, event = event.as_str(), "applied role event");
                }
            }
            RoleEvent::UserRoleAssigned(assignment) => {
                let mut assignments = self.assignments.write().await;
                assignments.version += 1;
                let Some(entry) = assignments.slots.get_mut(&assignment.user_id) else {
                    return;
                };

                match entry.value.iter().position(|cached| cached.id == assignment.id) {
                    Some(index) => Arc::make_mut(&mut entry.value)[index] = assignment.clone(),
                    None => {
                        // A newer row for the same role wins over a late event.
                        if entry.value.iter().any(|cached| {
                            cached.role_id == assignment.role_id
                                && cached.created_at > assignment.created_at
                        }) {
                            debug!(
                                user_id = %assignment.user_id,
                                role_id = %assignment.role_id,
                                "ignored stale role assignment"
                            );
                            return;
                        }
                        let list = Arc::make_mut(&mut entry.value);
                        list.retain(|cached| cached.role_id != assignment.role_id);
                        list.push(assignment.clone());
                    }
                }
                debug!(
                    user_id = %assignment.user_id,
                    role_id = %assignment.role_id,
                    event = event.as_str(),
                    "applied role event"
                );
            }
            RoleEvent::UserRoleUnassigned(assignment) => {
                let mut assignments = self.assignments.write().await;
                assignments.version += 1;
                if let Some(entry) = assignments.slots.get_mut(&assignment.user_id)
                    && entry.value.iter().any(|cached| cached.id == assignment.id)
                {
                    Arc::make_mut(&mut entry.value).retain(|cached| cached.id != assignment.id);
                    debug!(
                        user_id = %assignment.user_id,
                        role_id = %assignment.role_id,
                        event = event.as_str(),
                        "applied role event"
                    );
                }
            }
        }
    }

    /// Drops every cached entry.
    pub async fn clear(&self) {
        {
            let mut roles = self.roles.write().await;
            roles.version += 1;
            roles.slots = None;
        }

        let mut assignments = self.assignments.write().await;
        assignments.version += 1;
        assignments.slots.clear();
    }

    /// Evicts expired entries and returns how many user lists were dropped.
    pub async fn prune(&self) -> usize {
        let now = Instant::now();
        {
            let mut roles = self.roles.write().await;
            if roles.slots.as_ref().is_some_and(|entry| !entry.is_fresh(now)) {
                roles.slots = None;
            }
        }

        let mut assignments = self.assignments.write().await;
        let before = assignments.slots.len();
        assignments.slots.retain(|_, entry| entry.is_fresh(now));
        before - assignments.slots.len()
    }
}

#[cfg(test)]
mod tests;
