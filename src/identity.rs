//! User identity: logging a principal into the platform and mapping the
//! platform account to an application contact.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::BootError;
use crate::flavors::UserSyncRoutine;
use crate::types::Flavor;

/// A platform account that has been logged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserIdentity {
    pub principal: String,
    pub account_id: u64,
}

/// A platform account linked to its application contact record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserContact {
    pub principal: String,
    pub account_id: u64,
    pub contact_id: u64,
}

pub trait IdentityProvider {
    fn login(&self, flavor: Flavor, principal: &str) -> Result<UserIdentity, BootError>;

    fn synchronize(
        &self,
        routine: UserSyncRoutine,
        identity: &UserIdentity,
    ) -> Result<UserContact, BootError>;
}

/// Refuses every request. Used when the caller has not wired up a provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableIdentity;

impl IdentityProvider for UnavailableIdentity {
    fn login(&self, _flavor: Flavor, principal: &str) -> Result<UserIdentity, BootError> {
        Err(BootError::UserSyncFailure {
            principal: principal.to_string(),
            reason: "no identity provider is configured".into(),
        })
    }

    fn synchronize(
        &self,
        _routine: UserSyncRoutine,
        identity: &UserIdentity,
    ) -> Result<UserContact, BootError> {
        Err(BootError::UserSyncFailure {
            principal: identity.principal.clone(),
            reason: "no identity provider is configured".into(),
        })
    }
}

/// Fixed table of known accounts.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    accounts: BTreeMap<String, (u64, Option<u64>)>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account, optionally already linked to a contact.
    pub fn account(mut self, principal: &str, account_id: u64, contact_id: Option<u64>) -> Self {
        self.accounts
            .insert(principal.to_string(), (account_id, contact_id));
        self
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn login(&self, flavor: Flavor, principal: &str) -> Result<UserIdentity, BootError> {
        let (account_id, _) =
            self.accounts
                .get(principal)
                .ok_or_else(|| BootError::UserSyncFailure {
                    principal: principal.to_string(),
                    reason: format!("no {flavor} account with that name"),
                })?;
        Ok(UserIdentity {
            principal: principal.to_string(),
            account_id: *account_id,
        })
    }

    fn synchronize(
        &self,
        routine: UserSyncRoutine,
        identity: &UserIdentity,
    ) -> Result<UserContact, BootError> {
        let contact_id = self
            .accounts
            .get(&identity.principal)
            .and_then(|(_, contact)| *contact)
            .ok_or_else(|| BootError::UserSyncFailure {
                principal: identity.principal.clone(),
                reason: format!("{routine:?} found no linked contact"),
            })?;
        Ok(UserContact {
            principal: identity.principal.clone(),
            account_id: identity.account_id,
            contact_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_provider_logs_in_and_links() {
        let provider = StaticIdentityProvider::new().account("admin", 1, Some(202));
        let identity = provider.login(Flavor::Drupal, "admin").unwrap();
        assert_eq!(identity.account_id, 1);
        let contact = provider
            .synchronize(UserSyncRoutine::DrupalAccount, &identity)
            .unwrap();
        assert_eq!(contact.contact_id, 202);
    }

    #[test]
    fn unknown_principal_fails() {
        let provider = StaticIdentityProvider::new();
        assert!(matches!(
            provider.login(Flavor::WordPress, "ghost"),
            Err(BootError::UserSyncFailure { .. })
        ));
    }

    #[test]
    fn unlinked_account_fails_to_sync() {
        let provider = StaticIdentityProvider::new().account("editor", 7, None);
        let identity = provider.login(Flavor::Joomla, "editor").unwrap();
        assert!(
            provider
                .synchronize(UserSyncRoutine::JoomlaUser, &identity)
                .is_err()
        );
    }

    #[test]
    fn unavailable_provider_always_fails() {
        let err = UnavailableIdentity.login(Flavor::Drupal, "admin").unwrap_err();
        assert!(err.to_string().contains("admin"));
    }
}
