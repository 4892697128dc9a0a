//! Role-based access to care records.
//!
//! Rule cascade, checked in order, default deny:
//! 1. Administrator → every record
//! 2. Doctor → patients assigned to the doctor's profile, and their
//!    schedules and dose history
//! 3. Patient → the patient record linked to the account by email
//! 4. Otherwise → DENY

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository;
use crate::db::DatabaseError;
use crate::error::ServiceError;
use crate::models::enums::UserRole;
use crate::models::{PatientFilter, UserProfile};

/// The signed-in user plus the care records the account is linked to.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub name: String,
    pub role: UserRole,
    /// Doctor profile of a doctor account.
    pub doctor_id: Option<Uuid>,
    /// Patient record of a patient account.
    pub patient_id: Option<Uuid>,
}

impl Actor {
    /// Resolve the links of a profile. Doctor accounts link through
    /// `doctors.user_id`, patient accounts through the patient email.
    pub fn resolve(conn: &Connection, profile: &UserProfile) -> Result<Self, DatabaseError> {
        let (doctor_id, patient_id) = match profile.role {
            UserRole::Admin => (None, None),
            UserRole::Doctor => (
                repository::get_doctor_by_user(conn, &profile.id)?
                    .filter(|d| d.is_active)
                    .map(|d| d.id),
                None,
            ),
            UserRole::Patient => (
                None,
                repository::get_active_patient_by_email(conn, &profile.email)?.map(|p| p.id),
            ),
        };
        Ok(Self {
            user_id: profile.id,
            name: profile.name.clone(),
            role: profile.role,
            doctor_id,
            patient_id,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Why access was granted (or denied), for the request log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessReason {
    Administrator,
    TreatingDoctor,
    OwnRecord,
    Denied,
}

impl AccessReason {
    pub fn allowed(self) -> bool {
        self != Self::Denied
    }
}

/// Decide whether `actor` may see the patient with `patient_id`, given the
/// doctor the patient is assigned to.
pub fn check_patient_access(
    actor: &Actor,
    patient_id: &Uuid,
    assigned_doctor: Option<&Uuid>,
) -> AccessReason {
    match actor.role {
        UserRole::Admin => AccessReason::Administrator,
        UserRole::Doctor => match (actor.doctor_id.as_ref(), assigned_doctor) {
            (Some(mine), Some(theirs)) if mine == theirs => AccessReason::TreatingDoctor,
            _ => AccessReason::Denied,
        },
        UserRole::Patient if actor.patient_id.as_ref() == Some(patient_id) => {
            AccessReason::OwnRecord
        }
        UserRole::Patient => AccessReason::Denied,
    }
}

/// Load-and-check for a single patient. Denials and missing patients are
/// reported the same way to non-admins so ids cannot be probed.
pub fn authorize_patient(
    conn: &Connection,
    actor: &Actor,
    patient_id: &Uuid,
) -> Result<AccessReason, ServiceError> {
    let patient = repository::get_patient(conn, patient_id)?;
    let reason = match &patient {
        Some(p) => check_patient_access(actor, &p.id, p.doctor_id.as_ref()),
        None if actor.is_admin() => return Err(ServiceError::not_found("patient")),
        None => AccessReason::Denied,
    };
    if !reason.allowed() {
        tracing::warn!(user_id = %actor.user_id, %patient_id, "Patient access denied");
        return Err(ServiceError::Forbidden);
    }
    Ok(reason)
}

/// Patients whose records `actor` may list. `None` means no restriction.
pub fn patient_scope(conn: &Connection, actor: &Actor) -> Result<Option<Vec<Uuid>>, DatabaseError> {
    match actor.role {
        UserRole::Admin => Ok(None),
        UserRole::Doctor => match actor.doctor_id {
            Some(doctor_id) => {
                let patients = repository::list_patients(
                    conn,
                    &PatientFilter {
                        doctor_id: Some(doctor_id),
                        ..Default::default()
                    },
                )?;
                Ok(Some(patients.into_iter().map(|p| p.id).collect()))
            }
            None => Ok(Some(Vec::new())),
        },
        UserRole::Patient => Ok(Some(actor.patient_id.into_iter().collect())),
    }
}

pub fn require_role(actor: &Actor, allowed: &[UserRole]) -> Result<(), ServiceError> {
    if allowed.contains(&actor.role) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden)
    }
}
