//! # User Profiles
//!
//! Every authenticated user has a profile carrying their role. Partner
//! users are bound to exactly one partner.

use crate::error::{MarketError, MarketResult};
use crate::order::ShippingDetails;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Partner,
    #[default]
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Partner => "partner",
            Role::Client => "client",
        }
    }

    pub fn parse(value: &str) -> MarketResult<Self> {
        match value {
            "admin" => Ok(Role::Admin),
            "partner" => Ok(Role::Partner),
            "client" => Ok(Role::Client),
            other => Err(MarketError::validation("role", format!("unknown role: {other}"))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: Role,
    /// Set exactly when `role` is `Partner`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_shipping: Option<ShippingDetails>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// New client profile for a first-time user
    pub fn new_client(user_id: Uuid, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            email: email.into(),
            full_name: String::new(),
            phone: None,
            role: Role::Client,
            partner_id: None,
            default_shipping: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> MarketResult<()> {
        match (self.role, self.partner_id) {
            (Role::Partner, None) => Err(MarketError::validation(
                "partner_id",
                "partner users must be bound to a partner",
            )),
            (Role::Admin | Role::Client, Some(_)) => Err(MarketError::validation(
                "partner_id",
                "only partner users may be bound to a partner",
            )),
            _ => Ok(()),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The partner this user manages, if any
    pub fn managed_partner(&self) -> Option<Uuid> {
        match self.role {
            Role::Partner => self.partner_id,
            _ => None,
        }
    }
}

/// Fields a user may change on their own profile
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub default_shipping: Option<ShippingDetails>,
}

impl ProfileUpdate {
    pub fn apply(self, profile: &mut Profile) -> MarketResult<()> {
        if let Some(name) = self.full_name {
            profile.full_name = name.trim().to_string();
        }
        if let Some(phone) = self.phone {
            let phone = phone.trim().to_string();
            profile.phone = (!phone.is_empty()).then_some(phone);
        }
        if let Some(shipping) = self.default_shipping {
            shipping.validate()?;
            profile.default_shipping = Some(shipping);
        }
        profile.updated_at = Utc::now();
        Ok(())
    }
}

/// Admin-only role change
#[derive(Debug, Clone, Deserialize)]
pub struct RoleAssignment {
    pub role: Role,
    #[serde(default)]
    pub partner_id: Option<Uuid>,
}

impl RoleAssignment {
    pub fn apply(self, profile: &mut Profile) -> MarketResult<()> {
        profile.role = self.role;
        profile.partner_id = self.partner_id;
        profile.validate()?;
        profile.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_client_is_valid() {
        let profile = Profile::new_client(Uuid::new_v4(), "a@b.io");
        assert_eq!(profile.role, Role::Client);
        assert!(profile.validate().is_ok());
        assert!(profile.managed_partner().is_none());
    }

    #[test]
    fn test_partner_binding_invariant() {
        let mut profile = Profile::new_client(Uuid::new_v4(), "p@lab.io");

        let missing = RoleAssignment {
            role: Role::Partner,
            partner_id: None,
        };
        assert!(missing.apply(&mut profile).is_err());

        let partner_id = Uuid::new_v4();
        let ok = RoleAssignment {
            role: Role::Partner,
            partner_id: Some(partner_id),
        };
        let mut profile = Profile::new_client(Uuid::new_v4(), "p@lab.io");
        ok.apply(&mut profile).unwrap();
        assert_eq!(profile.managed_partner(), Some(partner_id));

        let stray = RoleAssignment {
            role: Role::Admin,
            partner_id: Some(partner_id),
        };
        assert!(stray.apply(&mut profile).is_err());
    }

    #[test]
    fn test_profile_update_blank_phone_clears() {
        let mut profile = Profile::new_client(Uuid::new_v4(), "a@b.io");
        profile.phone = Some("555".into());
        ProfileUpdate {
            full_name: Some("  Ada Lovelace ".into()),
            phone: Some("  ".into()),
            default_shipping: None,
        }
        .apply(&mut profile)
        .unwrap();
        assert_eq!(profile.full_name, "Ada Lovelace");
        assert!(profile.phone.is_none());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("admin").unwrap(), Role::Admin);
        assert!(Role::parse("root").is_err());
    }
}
