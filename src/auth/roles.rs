// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles carried in the persisted user record.

use serde::{Deserialize, Serialize};

/// User roles for authorization.
///
/// ## Role Hierarchy
///
/// - `Admin` - Creates events and QR codes, sees every dashboard
/// - `Volunteer` - Redeems rewards and views their own NFTs and activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Role {
    /// Event organiser
    Admin,
    /// Volunteer user
    Volunteer,
}

impl Role {
    /// Check if this role has at least the privileges of the required role.
    pub fn has_privilege(&self, required: Role) -> bool {
        match (self, required) {
            (Role::Admin, _) => true,
            (Role::Volunteer, Role::Volunteer) => true,
            _ => false,
        }
    }

    /// Parse role from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "volunteer" | "user" => Some(Role::Volunteer),
            _ => None,
        }
    }
}

impl From<String> for Role {
    /// Unknown roles collapse to the least privileged one.
    fn from(value: String) -> Self {
        Role::parse(&value).unwrap_or_default()
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Volunteer
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Volunteer => write!(f, "volunteer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_has_all_privileges() {
        assert!(Role::Admin.has_privilege(Role::Admin));
        assert!(Role::Admin.has_privilege(Role::Volunteer));
    }

    #[test]
    fn volunteer_is_not_admin() {
        assert!(!Role::Volunteer.has_privilege(Role::Admin));
        assert!(Role::Volunteer.has_privilege(Role::Volunteer));
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("Volunteer"), Some(Role::Volunteer));
        assert_eq!(Role::parse("root"), None);
    }

    #[test]
    fn unknown_role_deserializes_to_volunteer() {
        let role: Role = serde_json::from_str(r#""superuser""#).unwrap();
        assert_eq!(role, Role::Volunteer);
        let role: Role = serde_json::from_str(r#""Admin""#).unwrap();
        assert_eq!(role, Role::Admin);
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), r#""admin""#);
    }
}
