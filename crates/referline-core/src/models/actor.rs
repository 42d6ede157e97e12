//! Actor domain model.
//!
//! Every party in the system (admins, employees, DSAs, clients, ...) is an
//! [`Actor`]. The role tag is fixed at creation; role-specific data lives in
//! a [`RoleProfile`] variant rather than in a wide record of optional fields.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ReferlineError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Admin,
    Employee,
    SubEmployee,
    Dsa,
    SubDsa,
    Client,
    CallCentre,
}

impl ActorRole {
    pub const ALL: [ActorRole; 7] = [
        ActorRole::Admin,
        ActorRole::Employee,
        ActorRole::SubEmployee,
        ActorRole::Dsa,
        ActorRole::SubDsa,
        ActorRole::Client,
        ActorRole::CallCentre,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Admin => "admin",
            ActorRole::Employee => "employee",
            ActorRole::SubEmployee => "sub_employee",
            ActorRole::Dsa => "dsa",
            ActorRole::SubDsa => "sub_dsa",
            ActorRole::Client => "client",
            ActorRole::CallCentre => "call_centre",
        }
    }

    /// Fixed structural level of the role in the referral tree
    /// (0 = root admin).
    pub fn level(&self) -> u8 {
        match self {
            ActorRole::Admin => 0,
            ActorRole::Employee | ActorRole::CallCentre => 1,
            ActorRole::SubEmployee => 2,
            ActorRole::Dsa => 3,
            ActorRole::SubDsa => 4,
            ActorRole::Client => 5,
        }
    }

    /// Whether an actor of this role may onboard an actor of `child` role.
    pub fn can_onboard(&self, child: ActorRole) -> bool {
        use ActorRole::*;
        matches!(
            (self, child),
            (Admin, Employee | Dsa | CallCentre)
                | (Employee, Employee | SubEmployee | Dsa | Client)
                | (SubEmployee, Dsa | Client)
                | (Dsa, SubDsa | Client)
                | (SubDsa, Client)
                | (CallCentre, Client)
        )
    }

    /// Only admins may exist without a parent.
    pub fn may_be_root(&self) -> bool {
        matches!(self, ActorRole::Admin)
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorRole {
    type Err = ReferlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActorRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ReferlineError::validation(format!("unknown actor role: {s}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActorStatus {
    PendingVerification,
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum KycStatus {
    NotSubmitted,
    Submitted,
    Verified,
    Rejected,
}

/// Role-specific payload of an actor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoleProfile {
    Admin,
    Employee {
        employee_code: Option<String>,
        designation: Option<String>,
    },
    SubEmployee {
        employee_code: Option<String>,
    },
    Dsa {
        agency_name: Option<String>,
        pan_number: Option<String>,
    },
    SubDsa {
        pan_number: Option<String>,
    },
    Client {
        city: Option<String>,
        monthly_income: Option<u64>,
    },
    CallCentre {
        desk: Option<String>,
    },
}

impl RoleProfile {
    /// The profile with every optional field unset.
    pub fn empty_for(role: ActorRole) -> Self {
        match role {
            ActorRole::Admin => RoleProfile::Admin,
            ActorRole::Employee => RoleProfile::Employee {
                employee_code: None,
                designation: None,
            },
            ActorRole::SubEmployee => RoleProfile::SubEmployee {
                employee_code: None,
            },
            ActorRole::Dsa => RoleProfile::Dsa {
                agency_name: None,
                pan_number: None,
            },
            ActorRole::SubDsa => RoleProfile::SubDsa { pan_number: None },
            ActorRole::Client => RoleProfile::Client {
                city: None,
                monthly_income: None,
            },
            ActorRole::CallCentre => RoleProfile::CallCentre { desk: None },
        }
    }

    pub fn role(&self) -> ActorRole {
        match self {
            RoleProfile::Admin => ActorRole::Admin,
            RoleProfile::Employee { .. } => ActorRole::Employee,
            RoleProfile::SubEmployee { .. } => ActorRole::SubEmployee,
            RoleProfile::Dsa { .. } => ActorRole::Dsa,
            RoleProfile::SubDsa { .. } => ActorRole::SubDsa,
            RoleProfile::Client { .. } => ActorRole::Client,
            RoleProfile::CallCentre { .. } => ActorRole::CallCentre,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Opaque credential material supplied by the auth collaborator.
    #[serde(skip_serializing)]
    pub credential_hash: Option<String>,
    pub status: ActorStatus,
    pub kyc_status: KycStatus,
    pub profile: RoleProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateActor {
    pub role: ActorRole,
    /// `None` only for root admins.
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub credential_hash: Option<String>,
    pub profile: Option<RoleProfile>,
}

impl CreateActor {
    /// Checks that do not need the store: required fields and
    /// profile/role agreement. Returns the profile to persist.
    pub fn validated_profile(&self) -> Result<RoleProfile, ReferlineError> {
        if self.name.trim().is_empty() {
            return Err(ReferlineError::validation("actor name is required"));
        }
        if !self.email.contains('@') {
            return Err(ReferlineError::validation(format!(
                "invalid email address: {}",
                self.email
            )));
        }
        if self.parent_id.is_none() && !self.role.may_be_root() {
            return Err(ReferlineError::validation(format!(
                "a {} must be onboarded by a parent actor",
                self.role
            )));
        }
        match &self.profile {
            Some(profile) if profile.role() != self.role => {
                Err(ReferlineError::validation(format!(
                    "profile of kind {} does not match role {}",
                    profile.role(),
                    self.role
                )))
            }
            Some(profile) => Ok(profile.clone()),
            None => Ok(RoleProfile::empty_for(self.role)),
        }
    }
}

/// Mutable actor fields. The role is deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateActor {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub status: Option<ActorStatus>,
    pub kyc_status: Option<KycStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(role: ActorRole, parent_id: Option<Uuid>) -> CreateActor {
        CreateActor {
            role,
            parent_id,
            name: "Asha".into(),
            email: "asha@example.com".into(),
            phone: None,
            credential_hash: None,
            profile: None,
        }
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in ActorRole::ALL {
            assert_eq!(role.as_str().parse::<ActorRole>().unwrap(), role);
        }
        assert!(matches!(
            "supervisor".parse::<ActorRole>(),
            Err(ReferlineError::Validation { .. })
        ));
    }

    #[test]
    fn onboarding_matrix() {
        use ActorRole::*;
        assert!(Admin.can_onboard(Employee));
        assert!(Admin.can_onboard(Dsa));
        assert!(Employee.can_onboard(SubEmployee));
        assert!(Employee.can_onboard(Dsa));
        assert!(Dsa.can_onboard(SubDsa));
        assert!(!Dsa.can_onboard(Employee));
        assert!(!SubDsa.can_onboard(SubDsa));
        assert!(!Client.can_onboard(Client));
        assert!(!Employee.can_onboard(Admin));
    }

    #[test]
    fn non_admin_requires_parent() {
        let err = input(ActorRole::Dsa, None).validated_profile().unwrap_err();
        assert!(matches!(err, ReferlineError::Validation { .. }));
        assert!(input(ActorRole::Admin, None).validated_profile().is_ok());
    }

    #[test]
    fn mismatched_profile_is_rejected() {
        let mut create = input(ActorRole::Employee, Some(Uuid::new_v4()));
        create.profile = Some(RoleProfile::Dsa {
            agency_name: Some("Acme Loans".into()),
            pan_number: None,
        });
        assert!(create.validated_profile().is_err());
    }

    #[test]
    fn missing_profile_defaults_to_empty_for_role() {
        let create = input(ActorRole::SubDsa, Some(Uuid::new_v4()));
        assert_eq!(
            create.validated_profile().unwrap(),
            RoleProfile::SubDsa { pan_number: None }
        );
    }

    #[test]
    fn profile_serializes_with_kind_tag() {
        let json = serde_json::to_value(RoleProfile::Dsa {
            agency_name: Some("Acme".into()),
            pan_number: None,
        })
        .unwrap();
        assert_eq!(json["kind"], "dsa");
        assert_eq!(json["agency_name"], "Acme");
    }
}
