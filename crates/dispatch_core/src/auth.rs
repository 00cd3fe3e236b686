//! Caller identity and role resolution (C6).
//!
//! The pilot has no real authentication provider: a caller is identified by
//! an opaque `UserId` handed to every operation, and its `Role` is looked up
//! from `users/<uid>`. Unknown users default to `Role::Passenger` rather
//! than erroring, since a passenger's first call (submitting a trip request)
//! happens before any `users/<uid>` document necessarily exists.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::ids::UserId;
use crate::model::Role;

/// Resolves a `UserId` to its `Role`.
///
/// This crate does not model the `users/<uid>` collection as a `Store`
/// document type (out of scope per `spec.md`'s auth non-goals), so roles are
/// held in a small in-process registry instead — good enough for the pilot
/// and for tests that need a manager/admin caller.
#[derive(Default)]
pub struct RoleRegistry {
    roles: RwLock<HashMap<UserId, Role>>,
}

impl RoleRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn set_role(&self, user_id: UserId, role: Role) {
        self.roles.write().await.insert(user_id, role);
    }

    /// Unregistered users are treated as `Role::Passenger`.
    pub async fn role_of(&self, user_id: &UserId) -> Role {
        self.roles
            .read()
            .await
            .get(user_id)
            .copied()
            .unwrap_or(Role::Passenger)
    }

    pub async fn is_manager_or_admin(&self, user_id: &UserId) -> bool {
        self.role_of(user_id).await.is_manager_or_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unregistered_user_defaults_to_passenger() {
        let registry = RoleRegistry::new();
        let role = registry.role_of(&UserId::from("u1")).await;
        assert_eq!(role, Role::Passenger);
    }

    #[tokio::test]
    async fn registered_manager_is_recognized() {
        let registry = RoleRegistry::new();
        let user_id = UserId::from("u2");
        registry.set_role(user_id.clone(), Role::Manager).await;
        assert!(registry.is_manager_or_admin(&user_id).await);
    }

    #[tokio::test]
    async fn driver_role_is_not_manager() {
        let registry = RoleRegistry::new();
        let user_id = UserId::from("u3");
        registry.set_role(user_id.clone(), Role::Driver).await;
        assert!(!registry.is_manager_or_admin(&user_id).await);
    }
}
