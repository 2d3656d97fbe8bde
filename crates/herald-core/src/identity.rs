//! Verified identity of a connecting principal.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::group::GroupKey;

/// Attributes returned by the identity verifier for one connection.
///
/// Produced once per connection at admission and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Subject identifier (user id).
    pub id: String,
    /// Employee code, if the principal is an employee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    /// Human-readable login name, used for log context only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Role names granted to the principal.
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Identity {
    /// Identity with only a subject id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            employee_id: None,
            username: None,
            roles: BTreeSet::new(),
        }
    }

    /// Set the employee code.
    #[must_use]
    pub fn with_employee_id(mut self, employee_id: impl Into<String>) -> Self {
        self.employee_id = Some(employee_id.into());
        self
    }

    /// Set the login name.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Add roles.
    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Name to show in logs: the username when known, otherwise the id.
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.id)
    }

    /// Groups every connection of this identity joins on registration:
    /// `user:<id>`, `employee:<id>` when present, and `role:<r>` per role.
    pub fn default_groups(&self) -> Vec<GroupKey> {
        let mut groups = Vec::with_capacity(self.roles.len() + 2);
        groups.push(GroupKey::User(self.id.clone()));
        if let Some(emp) = &self.employee_id {
            groups.push(GroupKey::Employee(emp.clone()));
        }
        groups.extend(self.roles.iter().cloned().map(GroupKey::Role));
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_groups_minimal() {
        let identity = Identity::new("u1");
        assert_eq!(identity.default_groups(), vec![GroupKey::User("u1".into())]);
    }

    #[test]
    fn default_groups_full() {
        let identity = Identity::new("u1")
            .with_employee_id("EMP001")
            .with_roles(["manager", "hr_staff"]);
        let keys: Vec<String> = identity
            .default_groups()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            keys,
            vec!["user:u1", "employee:EMP001", "role:hr_staff", "role:manager"]
        );
    }

    #[test]
    fn duplicate_roles_collapse() {
        let identity = Identity::new("u1").with_roles(["admin", "admin"]);
        assert_eq!(identity.roles.len(), 1);
    }

    #[test]
    fn display_name_prefers_username() {
        let identity = Identity::new("u1");
        assert_eq!(identity.display_name(), "u1");
        let identity = identity.with_username("alice");
        assert_eq!(identity.display_name(), "alice");
    }

    #[test]
    fn serde_uses_camel_case() {
        let identity = Identity::new("u1").with_employee_id("E1");
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["employeeId"], "E1");
        assert!(json.get("username").is_none());
    }
}
