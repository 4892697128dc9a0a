//! Medication schedules: which patient takes which drug, at what times,
//! over which date range.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::{self, Actor};
use crate::db::repository;
use crate::error::ServiceError;
use crate::models::enums::UserRole;
use crate::models::{Doctor, Medication, MedicationSchedule, PatientFilter, ScheduleFilter};
use crate::validation::{self, ValidationError};

// ═══════════════════════════════════════════
// Input types
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScheduleForm {
    pub patient_id: Option<Uuid>,
    pub medication_id: Option<Uuid>,
    pub dosage: String,
    pub times: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub instructions: Option<String>,
    /// Prescribing doctor. Ignored for doctors, who always prescribe as
    /// themselves.
    pub prescribed_by: Option<Uuid>,
}

/// Checked schedule form.
struct ValidSchedule {
    patient_id: Uuid,
    medication_id: Uuid,
    dosage: String,
    times: Vec<String>,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl ScheduleForm {
    fn check(&self) -> Result<ValidSchedule, ValidationError> {
        let patient_id = self.patient_id.ok_or_else(|| missing("patient_id"))?;
        let medication_id = self.medication_id.ok_or_else(|| missing("medication_id"))?;
        let dosage = validation::required("dosage", &self.dosage)?;
        let times = validation::dose_times(&self.times)?;
        let start_date = self.start_date.ok_or_else(|| missing("start_date"))?;
        let end_date = self.end_date.ok_or_else(|| missing("end_date"))?;
        validation::date_range(start_date, end_date)?;
        Ok(ValidSchedule {
            patient_id,
            medication_id,
            dosage,
            times,
            start_date,
            end_date,
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.check().map(|_| ())
    }
}

fn missing(field: &'static str) -> ValidationError {
    ValidationError::new(field, "Please fill in all required fields")
}

/// Absent fields keep their stored value. The patient cannot change.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchedulePatch {
    pub medication_id: Option<Uuid>,
    pub dosage: Option<String>,
    pub times: Option<Vec<String>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScheduleQuery {
    pub search: String,
    pub patient_id: Option<Uuid>,
    pub include_inactive: bool,
}

// ═══════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════

/// Schedules visible to `actor`, narrowed by the query.
pub fn fetch_schedules(
    conn: &Connection,
    actor: &Actor,
    query: &ScheduleQuery,
) -> Result<Vec<MedicationSchedule>, ServiceError> {
    let scope = authorization::patient_scope(conn, actor)?;
    if let (Some(ids), Some(wanted)) = (&scope, query.patient_id) {
        if !ids.contains(&wanted) {
            return Err(ServiceError::Forbidden);
        }
    }
    let filter = ScheduleFilter {
        patient_id: query.patient_id,
        patient_ids: if query.patient_id.is_some() { None } else { scope },
        include_inactive: query.include_inactive && actor.is_admin(),
    };
    let schedules = repository::list_schedules(conn, &filter)?;
    if query.search.trim().is_empty() {
        return Ok(schedules);
    }

    let names = patient_names(conn)?;
    Ok(schedules
        .into_iter()
        .filter(|s| {
            let patient = names.get(&s.patient_id).map(String::as_str).unwrap_or_default();
            validation::matches_search(
                &query.search,
                &[
                    s.medication_name.as_str(),
                    patient,
                    s.prescribed_by_name.as_str(),
                    s.instructions.as_deref().unwrap_or_default(),
                ],
            )
        })
        .collect())
}

/// Id → name for every patient, used by the search boxes.
pub(crate) fn patient_names(conn: &Connection) -> Result<HashMap<Uuid, String>, ServiceError> {
    let patients = repository::list_patients(
        conn,
        &PatientFilter {
            include_inactive: true,
            ..Default::default()
        },
    )?;
    Ok(patients.into_iter().map(|p| (p.id, p.name)).collect())
}

/// The signed-in patient's own schedules, newest start date first.
pub fn fetch_own_schedules(
    conn: &Connection,
    actor: &Actor,
) -> Result<Vec<MedicationSchedule>, ServiceError> {
    authorization::require_role(actor, &[UserRole::Patient])?;
    let Some(patient_id) = actor.patient_id else {
        return Ok(Vec::new());
    };
    Ok(repository::list_schedules(
        conn,
        &ScheduleFilter {
            patient_id: Some(patient_id),
            ..Default::default()
        },
    )?)
}

pub fn fetch_schedule(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
) -> Result<MedicationSchedule, ServiceError> {
    let schedule =
        repository::get_schedule(conn, id)?.ok_or_else(|| ServiceError::not_found("schedule"))?;
    authorization::authorize_patient(conn, actor, &schedule.patient_id)?;
    Ok(schedule)
}

pub fn create_schedule(
    conn: &Connection,
    actor: &Actor,
    form: &ScheduleForm,
) -> Result<MedicationSchedule, ServiceError> {
    authorization::require_role(actor, &[UserRole::Admin, UserRole::Doctor])?;
    let valid = form.check()?;
    authorization::authorize_patient(conn, actor, &valid.patient_id)?;
    let medication = active_medication(conn, &valid.medication_id)?;
    let prescriber = prescriber(conn, actor, form.prescribed_by)?;

    let now = Utc::now();
    let schedule = MedicationSchedule {
        id: Uuid::new_v4(),
        patient_id: valid.patient_id,
        medication_id: medication.id,
        medication_name: medication.label_with_dosage(&valid.dosage),
        dosage: valid.dosage,
        times: valid.times,
        start_date: valid.start_date,
        end_date: valid.end_date,
        instructions: validation::optional_text(form.instructions.clone()),
        prescribed_by: prescriber.as_ref().map(|d| d.id),
        prescribed_by_name: prescriber.as_ref().map(prescriber_label).unwrap_or_default(),
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    repository::insert_schedule(conn, &schedule)?;
    tracing::info!(
        schedule_id = %schedule.id,
        patient_id = %schedule.patient_id,
        doses_per_day = schedule.times.len(),
        "Schedule created"
    );
    Ok(schedule)
}

pub fn update_schedule(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    patch: &SchedulePatch,
) -> Result<MedicationSchedule, ServiceError> {
    authorization::require_role(actor, &[UserRole::Admin, UserRole::Doctor])?;
    if let Some(dosage) = &patch.dosage {
        validation::required("dosage", dosage)?;
    }
    let times = patch.times.as_deref().map(validation::dose_times).transpose()?;

    let mut schedule = fetch_schedule(conn, actor, id)?;
    let start = patch.start_date.unwrap_or(schedule.start_date);
    let end = patch.end_date.unwrap_or(schedule.end_date);
    validation::date_range(start, end)?;

    let relabel = patch.medication_id.is_some() || patch.dosage.is_some();
    if let Some(dosage) = &patch.dosage {
        schedule.dosage = dosage.trim().to_string();
    }
    if relabel {
        let medication_id = patch.medication_id.unwrap_or(schedule.medication_id);
        let medication = match patch.medication_id {
            Some(_) => active_medication(conn, &medication_id)?,
            None => repository::get_medication(conn, &medication_id)?
                .ok_or_else(|| ServiceError::not_found("medication"))?,
        };
        schedule.medication_id = medication.id;
        schedule.medication_name = medication.label_with_dosage(&schedule.dosage);
    }
    if let Some(times) = times {
        schedule.times = times;
    }
    schedule.start_date = start;
    schedule.end_date = end;
    if patch.instructions.is_some() {
        schedule.instructions = validation::optional_text(patch.instructions.clone());
    }
    repository::update_schedule(conn, &schedule)?;
    repository::get_schedule(conn, id)?.ok_or_else(|| ServiceError::not_found("schedule"))
}

pub fn deactivate_schedule(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<(), ServiceError> {
    authorization::require_role(actor, &[UserRole::Admin, UserRole::Doctor])?;
    fetch_schedule(conn, actor, id)?;
    repository::deactivate_schedule(conn, id)?;
    tracing::info!(schedule_id = %id, "Schedule deactivated");
    Ok(())
}

// ═══════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════

fn active_medication(conn: &Connection, id: &Uuid) -> Result<Medication, ServiceError> {
    match repository::get_medication(conn, id)? {
        Some(m) if m.is_active => Ok(m),
        _ => Err(ValidationError::new("medication_id", "Selected medication does not exist").into()),
    }
}

/// Doctors prescribe as themselves; admins may name any active doctor.
fn prescriber(
    conn: &Connection,
    actor: &Actor,
    requested: Option<Uuid>,
) -> Result<Option<Doctor>, ServiceError> {
    let id = match actor.role {
        UserRole::Doctor => actor.doctor_id,
        _ => requested,
    };
    let Some(id) = id else {
        return Ok(None);
    };
    match repository::get_doctor(conn, &id)? {
        Some(d) if d.is_active => Ok(Some(d)),
        _ => Err(ValidationError::new("prescribed_by", "Selected doctor does not exist").into()),
    }
}

fn prescriber_label(doctor: &Doctor) -> String {
    format!("Dr. {}", doctor.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::MedicationCategory;
    use crate::test_fixtures;

    struct World {
        conn: Connection,
        doctor: Doctor,
        patient_id: Uuid,
        other_patient_id: Uuid,
        medication: Medication,
    }

    fn world() -> World {
        let conn = open_memory_database().unwrap();
        let doctor = test_fixtures::doctor("Michael Chen");
        repository::insert_doctor(&conn, &doctor).unwrap();
        let mut mine = test_fixtures::patient("John Smith", "john@email.com");
        mine.doctor_id = Some(doctor.id);
        repository::insert_patient(&conn, &mine).unwrap();
        let other = test_fixtures::patient("Emily Davis", "emily@email.com");
        repository::insert_patient(&conn, &other).unwrap();
        let medication = test_fixtures::medication("Metformin", MedicationCategory::Antidiabetic);
        repository::insert_medication(&conn, &medication).unwrap();
        World {
            conn,
            doctor,
            patient_id: mine.id,
            other_patient_id: other.id,
            medication,
        }
    }

    fn actor(role: UserRole, doctor_id: Option<Uuid>, patient_id: Option<Uuid>) -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            name: "Someone".into(),
            role,
            doctor_id,
            patient_id,
        }
    }

    fn form(w: &World, patient_id: Uuid) -> ScheduleForm {
        ScheduleForm {
            patient_id: Some(patient_id),
            medication_id: Some(w.medication.id),
            dosage: "500mg".into(),
            times: vec!["08:00".into(), "".into(), "20:00".into()],
            start_date: Some(test_fixtures::date("2024-01-15")),
            end_date: Some(test_fixtures::date("2024-07-15")),
            instructions: Some("After meals".into()),
            prescribed_by: None,
        }
    }

    #[test]
    fn doctor_prescribes_as_self() {
        let w = world();
        let me = actor(UserRole::Doctor, Some(w.doctor.id), None);
        let mut f = form(&w, w.patient_id);
        f.prescribed_by = Some(Uuid::new_v4());
        let s = create_schedule(&w.conn, &me, &f).unwrap();
        assert_eq!(s.medication_name, "Metformin 500mg");
        assert_eq!(s.times, vec!["08:00", "20:00"]);
        assert_eq!(s.prescribed_by, Some(w.doctor.id));
        assert_eq!(s.prescribed_by_name, "Dr. Michael Chen");
    }

    #[test]
    fn doctor_cannot_schedule_for_other_patients() {
        let w = world();
        let me = actor(UserRole::Doctor, Some(w.doctor.id), None);
        let err = create_schedule(&w.conn, &me, &form(&w, w.other_patient_id)).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden));
    }

    #[test]
    fn form_rules_checked_before_storage() {
        let w = world();
        let admin = actor(UserRole::Admin, None, None);
        let mut f = form(&w, w.patient_id);
        f.times = vec![" ".into()];
        assert!(matches!(
            create_schedule(&w.conn, &admin, &f),
            Err(ServiceError::Validation(ref v)) if v.field == "times"
        ));
        let mut f = form(&w, w.patient_id);
        f.end_date = Some(test_fixtures::date("2024-01-01"));
        assert!(create_schedule(&w.conn, &admin, &f).is_err());
        let mut f = form(&w, w.patient_id);
        f.medication_id = None;
        assert!(create_schedule(&w.conn, &admin, &f).is_err());
        let mut f = form(&w, w.patient_id);
        f.medication_id = Some(Uuid::new_v4());
        assert!(create_schedule(&w.conn, &admin, &f).is_err());
        assert!(repository::list_schedules(&w.conn, &ScheduleFilter::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn patient_role_cannot_create() {
        let w = world();
        let me = actor(UserRole::Patient, None, Some(w.patient_id));
        assert!(matches!(
            create_schedule(&w.conn, &me, &form(&w, w.patient_id)),
            Err(ServiceError::Forbidden)
        ));
    }

    #[test]
    fn lists_are_scoped_and_searchable() {
        let w = world();
        let admin = actor(UserRole::Admin, None, None);
        create_schedule(&w.conn, &admin, &form(&w, w.patient_id)).unwrap();
        create_schedule(&w.conn, &admin, &form(&w, w.other_patient_id)).unwrap();

        let doctor = actor(UserRole::Doctor, Some(w.doctor.id), None);
        assert_eq!(fetch_schedules(&w.conn, &admin, &ScheduleQuery::default()).unwrap().len(), 2);
        assert_eq!(fetch_schedules(&w.conn, &doctor, &ScheduleQuery::default()).unwrap().len(), 1);

        let q = ScheduleQuery {
            search: "emily".into(),
            ..Default::default()
        };
        let found = fetch_schedules(&w.conn, &admin, &q).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].patient_id, w.other_patient_id);

        let q = ScheduleQuery {
            patient_id: Some(w.other_patient_id),
            ..Default::default()
        };
        assert!(matches!(fetch_schedules(&w.conn, &doctor, &q), Err(ServiceError::Forbidden)));
    }

    #[test]
    fn patient_sees_own_schedules_only() {
        let w = world();
        let admin = actor(UserRole::Admin, None, None);
        create_schedule(&w.conn, &admin, &form(&w, w.patient_id)).unwrap();
        let other = create_schedule(&w.conn, &admin, &form(&w, w.other_patient_id)).unwrap();

        let me = actor(UserRole::Patient, None, Some(w.patient_id));
        let own = fetch_own_schedules(&w.conn, &me).unwrap();
        assert_eq!(own.len(), 1);
        assert!(matches!(fetch_schedule(&w.conn, &me, &other.id), Err(ServiceError::Forbidden)));

        let unlinked = actor(UserRole::Patient, None, None);
        assert!(fetch_own_schedules(&w.conn, &unlinked).unwrap().is_empty());
    }

    #[test]
    fn patch_relabels_on_dosage_change() {
        let w = world();
        let admin = actor(UserRole::Admin, None, None);
        let s = create_schedule(&w.conn, &admin, &form(&w, w.patient_id)).unwrap();

        let patch = SchedulePatch {
            dosage: Some("850mg".into()),
            times: Some(vec!["07:00".into()]),
            ..Default::default()
        };
        let updated = update_schedule(&w.conn, &admin, &s.id, &patch).unwrap();
        assert_eq!(updated.medication_name, "Metformin 850mg");
        assert_eq!(updated.times, vec!["07:00"]);
        assert_eq!(updated.start_date, s.start_date);

        let bad = SchedulePatch {
            end_date: Some(test_fixtures::date("2023-12-31")),
            ..Default::default()
        };
        assert!(update_schedule(&w.conn, &admin, &s.id, &bad).is_err());
    }

    #[test]
    fn deactivated_schedule_leaves_list() {
        let w = world();
        let admin = actor(UserRole::Admin, None, None);
        let s = create_schedule(&w.conn, &admin, &form(&w, w.patient_id)).unwrap();
        deactivate_schedule(&w.conn, &admin, &s.id).unwrap();
        assert!(fetch_schedules(&w.conn, &admin, &ScheduleQuery::default()).unwrap().is_empty());
        assert!(!fetch_schedule(&w.conn, &admin, &s.id).unwrap().is_active);
    }
}
