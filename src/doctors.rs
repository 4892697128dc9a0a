//! Doctor management (admin only).

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::{self, Actor};
use crate::db::repository;
use crate::error::ServiceError;
use crate::models::enums::UserRole;
use crate::models::{Doctor, DoctorFilter, PatientFilter};
use crate::validation::{self, ValidationError};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DoctorForm {
    pub name: String,
    pub email: String,
    pub specialization: String,
    pub license_number: String,
    pub phone: String,
}

impl DoctorForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::required("name", &self.name)?;
        validation::email("email", &self.email)?;
        validation::required("specialization", &self.specialization)?;
        validation::required("license_number", &self.license_number)?;
        Ok(())
    }
}

/// Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DoctorPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub phone: Option<String>,
}

impl DoctorPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(v) = &self.name {
            validation::required("name", v)?;
        }
        if let Some(v) = &self.email {
            validation::email("email", v)?;
        }
        if let Some(v) = &self.specialization {
            validation::required("specialization", v)?;
        }
        if let Some(v) = &self.license_number {
            validation::required("license_number", v)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DoctorQuery {
    pub search: String,
    pub include_inactive: bool,
}

pub fn fetch_doctors(
    conn: &Connection,
    actor: &Actor,
    query: &DoctorQuery,
) -> Result<Vec<Doctor>, ServiceError> {
    authorization::require_role(actor, &[UserRole::Admin])?;
    let doctors = repository::list_doctors(
        conn,
        &DoctorFilter {
            include_inactive: query.include_inactive,
            ..Default::default()
        },
    )?;
    Ok(doctors
        .into_iter()
        .filter(|d| {
            validation::matches_search(
                &query.search,
                &[
                    d.name.as_str(),
                    d.specialization.as_str(),
                    d.email.as_str(),
                    d.license_number.as_str(),
                ],
            )
        })
        .collect())
}

pub fn fetch_doctor(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<Doctor, ServiceError> {
    authorization::require_role(actor, &[UserRole::Admin])?;
    repository::get_doctor(conn, id)?.ok_or_else(|| ServiceError::not_found("doctor"))
}

pub fn create_doctor(conn: &Connection, actor: &Actor, form: &DoctorForm) -> Result<Doctor, ServiceError> {
    authorization::require_role(actor, &[UserRole::Admin])?;
    form.validate()?;
    let now = Utc::now();
    let doctor = Doctor {
        id: Uuid::new_v4(),
        user_id: None,
        name: form.name.trim().to_string(),
        email: form.email.trim().to_string(),
        specialization: form.specialization.trim().to_string(),
        license_number: form.license_number.trim().to_string(),
        phone: form.phone.trim().to_string(),
        patient_ids: Vec::new(),
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    repository::insert_doctor(conn, &doctor)?;
    tracing::info!(doctor_id = %doctor.id, "Doctor added");
    Ok(doctor)
}

/// Applies the patch. A new name is copied onto the assigned patients'
/// `doctor_name`.
pub fn update_doctor(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    patch: &DoctorPatch,
) -> Result<Doctor, ServiceError> {
    authorization::require_role(actor, &[UserRole::Admin])?;
    patch.validate()?;
    let mut doctor =
        repository::get_doctor(conn, id)?.ok_or_else(|| ServiceError::not_found("doctor"))?;
    let renamed = patch
        .name
        .as_deref()
        .is_some_and(|n| n.trim() != doctor.name);

    if let Some(v) = &patch.name {
        doctor.name = v.trim().to_string();
    }
    if let Some(v) = &patch.email {
        doctor.email = v.trim().to_string();
    }
    if let Some(v) = &patch.specialization {
        doctor.specialization = v.trim().to_string();
    }
    if let Some(v) = &patch.license_number {
        doctor.license_number = v.trim().to_string();
    }
    if let Some(v) = &patch.phone {
        doctor.phone = v.trim().to_string();
    }
    repository::update_doctor(conn, &doctor)?;

    if renamed {
        let patients = repository::list_patients(
            conn,
            &PatientFilter {
                doctor_id: Some(doctor.id),
                include_inactive: true,
                ..Default::default()
            },
        )?;
        for mut patient in patients {
            patient.doctor_name = doctor.name.clone();
            repository::update_patient(conn, &patient)?;
        }
    }
    repository::get_doctor(conn, id)?.ok_or_else(|| ServiceError::not_found("doctor"))
}

/// The linked sign-in account is disabled too; its sessions end on the
/// next request.
pub fn deactivate_doctor(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<(), ServiceError> {
    authorization::require_role(actor, &[UserRole::Admin])?;
    let doctor = repository::get_doctor(conn, id)?.ok_or_else(|| ServiceError::not_found("doctor"))?;
    repository::deactivate_doctor(conn, id)?;
    if let Some(user_id) = doctor.user_id {
        repository::set_user_active(conn, &user_id, false)?;
    }
    tracing::info!(doctor_id = %id, "Doctor deactivated");
    Ok(())
}
