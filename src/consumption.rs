//! Dose history: recording a dose and the read-only history pages.

use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authorization::{self, Actor};
use crate::db::repository;
use crate::error::ServiceError;
use crate::models::enums::{ConsumptionStatus, UserRole};
use crate::models::{ConsumptionFilter, ConsumptionRecord};
use crate::reporting::StatusBreakdown;
use crate::schedules;
use crate::validation::{self, ValidationError};

/// A dose as reported by the patient or entered by staff.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DoseForm {
    pub schedule_id: Option<Uuid>,
    /// Defaults to today.
    pub date: Option<NaiveDate>,
    pub scheduled_time: String,
    pub actual_time: Option<String>,
    pub status: String,
    pub notes: Option<String>,
}

impl DoseForm {
    fn check(&self) -> Result<(Uuid, String, Option<String>, ConsumptionStatus), ValidationError> {
        let schedule_id = self
            .schedule_id
            .ok_or_else(|| ValidationError::new("schedule_id", "Please fill in all required fields"))?;
        let status = ConsumptionStatus::from_str(self.status.trim())
            .map_err(|_| ValidationError::new("status", "Status must be taken, late or missed"))?;
        let scheduled = validation::time_of_day("scheduled_time", &self.scheduled_time)?;
        let actual = match validation::optional_text(self.actual_time.clone()) {
            Some(t) => Some(validation::time_of_day("actual_time", &t)?),
            None => None,
        };
        Ok((schedule_id, scheduled, actual, status))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.check().map(|_| ())
    }
}

/// Records a dose. A second report for the same schedule, day and time
/// replaces the first one's status instead of adding a row.
pub fn record_dose(
    conn: &Connection,
    actor: &Actor,
    form: &DoseForm,
    today: NaiveDate,
) -> Result<ConsumptionRecord, ServiceError> {
    let (schedule_id, scheduled_time, actual_time, status) = form.check()?;
    let schedule = schedules::fetch_schedule(conn, actor, &schedule_id)?;
    if !schedule.is_active {
        return Err(ValidationError::new("schedule_id", "This schedule is no longer active").into());
    }
    if !schedule.times.contains(&scheduled_time) {
        return Err(ValidationError::new("scheduled_time", "Time is not part of this schedule").into());
    }
    let date = form.date.unwrap_or(today);
    let notes = validation::optional_text(form.notes.clone());

    let existing = repository::list_consumption_records(
        conn,
        &ConsumptionFilter {
            schedule_id: Some(schedule.id),
            date: Some(date),
            ..Default::default()
        },
    )?
    .into_iter()
    .find(|r| r.scheduled_time == scheduled_time);

    if let Some(mut record) = existing {
        record.status = status;
        record.actual_time = actual_time;
        record.notes = notes;
        repository::update_consumption_record(conn, &record)?;
        tracing::info!(record_id = %record.id, status = %status, "Dose record updated");
        return repository::get_consumption_record(conn, &record.id)?
            .ok_or_else(|| ServiceError::not_found("consumption record"));
    }

    let now = Utc::now();
    let record = ConsumptionRecord {
        id: Uuid::new_v4(),
        patient_id: schedule.patient_id,
        schedule_id: schedule.id,
        medication_name: schedule.medication_name.clone(),
        scheduled_time,
        actual_time,
        status,
        date,
        notes,
        reminder_sent: false,
        created_at: now,
        updated_at: now,
    };
    repository::insert_consumption_record(conn, &record)?;
    tracing::info!(record_id = %record.id, status = %status, "Dose recorded");
    Ok(record)
}

// ═══════════════════════════════════════════
// History
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HistoryQuery {
    pub search: String,
    pub status: Option<ConsumptionStatus>,
    pub patient_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
}

/// A history row with the patient's name resolved.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub record: ConsumptionRecord,
    pub patient_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct History {
    pub records: Vec<HistoryEntry>,
    pub summary: StatusBreakdown,
}

/// Admin reports page (every patient) and the doctor history page (own
/// patients). The summary counts the rows after filtering.
pub fn fetch_history(
    conn: &Connection,
    actor: &Actor,
    query: &HistoryQuery,
) -> Result<History, ServiceError> {
    authorization::require_role(actor, &[UserRole::Admin, UserRole::Doctor])?;
    let scope = authorization::patient_scope(conn, actor)?;
    if let (Some(ids), Some(wanted)) = (&scope, query.patient_id) {
        if !ids.contains(&wanted) {
            return Err(ServiceError::Forbidden);
        }
    }
    let records = repository::list_consumption_records(
        conn,
        &ConsumptionFilter {
            patient_id: query.patient_id,
            patient_ids: if query.patient_id.is_some() { None } else { scope },
            status: query.status,
            date_from: query.date_from,
            ..Default::default()
        },
    )?;

    let names = schedules::patient_names(conn)?;
    let records: Vec<HistoryEntry> = records
        .into_iter()
        .map(|record| HistoryEntry {
            patient_name: names.get(&record.patient_id).cloned().unwrap_or_default(),
            record,
        })
        .filter(|e| {
            let date = e.record.date.to_string();
            validation::matches_search(
                &query.search,
                &[
                    e.record.medication_name.as_str(),
                    e.patient_name.as_str(),
                    e.record.status.as_str(),
                    date.as_str(),
                ],
            )
        })
        .collect();
    let summary = StatusBreakdown::of(records.iter().map(|e| &e.record));
    Ok(History { records, summary })
}

/// The signed-in patient's own history, newest first.
pub fn fetch_own_records(conn: &Connection, actor: &Actor) -> Result<Vec<ConsumptionRecord>, ServiceError> {
    authorization::require_role(actor, &[UserRole::Patient])?;
    let Some(patient_id) = actor.patient_id else {
        return Ok(Vec::new());
    };
    Ok(repository::list_consumption_records(
        conn,
        &ConsumptionFilter {
            patient_id: Some(patient_id),
            ..Default::default()
        },
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::MedicationCategory;
    use crate::models::MedicationSchedule;
    use crate::test_fixtures::{self, date};

    struct World {
        conn: Connection,
        doctor_id: Uuid,
        mine: MedicationSchedule,
        other: MedicationSchedule,
    }

    fn world() -> World {
        let conn = open_memory_database().unwrap();
        let doctor = test_fixtures::doctor("Michael Chen");
        repository::insert_doctor(&conn, &doctor).unwrap();
        let mut p = test_fixtures::patient("John Smith", "john@email.com");
        p.doctor_id = Some(doctor.id);
        repository::insert_patient(&conn, &p).unwrap();
        let q = test_fixtures::patient("Emily Davis", "emily@email.com");
        repository::insert_patient(&conn, &q).unwrap();
        let med = test_fixtures::medication("Metformin", MedicationCategory::Antidiabetic);
        repository::insert_medication(&conn, &med).unwrap();
        let mine = test_fixtures::schedule(p.id, med.id, &["08:00", "20:00"]);
        let mut other = test_fixtures::schedule(q.id, med.id, &["09:00"]);
        other.medication_name = "Amlodipine 5mg".into();
        repository::insert_schedule(&conn, &mine).unwrap();
        repository::insert_schedule(&conn, &other).unwrap();
        World {
            conn,
            doctor_id: doctor.id,
            mine,
            other,
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

    fn dose(schedule: &MedicationSchedule, time: &str, status: &str) -> DoseForm {
        DoseForm {
            schedule_id: Some(schedule.id),
            date: None,
            scheduled_time: time.into(),
            actual_time: Some(time.into()),
            status: status.into(),
            notes: None,
        }
    }

    #[test]
    fn patient_records_own_dose() {
        let w = world();
        let me = actor(UserRole::Patient, None, Some(w.mine.patient_id));
        let r = record_dose(&w.conn, &me, &dose(&w.mine, "08:00", "taken"), date("2024-03-01")).unwrap();
        assert_eq!(r.date, date("2024-03-01"));
        assert_eq!(r.medication_name, "Metformin 500mg");
        assert!(matches!(
            record_dose(&w.conn, &me, &dose(&w.other, "09:00", "taken"), date("2024-03-01")),
            Err(ServiceError::Forbidden)
        ));
    }

    #[test]
    fn deactivated_schedule_takes_no_doses() {
        let w = world();
        let admin = actor(UserRole::Admin, None, None);
        schedules::deactivate_schedule(&w.conn, &admin, &w.mine.id).unwrap();

        let me = actor(UserRole::Patient, None, Some(w.mine.patient_id));
        let err = record_dose(&w.conn, &me, &dose(&w.mine, "08:00", "missed"), date("2024-03-01"))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref v) if v.field == "schedule_id"));
        let all = repository::list_consumption_records(&w.conn, &ConsumptionFilter::default()).unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn status_must_be_explicit_and_known() {
        let w = world();
        let admin = actor(UserRole::Admin, None, None);
        let err = record_dose(&w.conn, &admin, &dose(&w.mine, "08:00", ""), date("2024-03-01"))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref v) if v.field == "status"));
        assert!(record_dose(&w.conn, &admin, &dose(&w.mine, "08:00", "skipped"), date("2024-03-01"))
            .is_err());
        let mut f = dose(&w.mine, "08:00", "late");
        f.actual_time = Some("8:30".into());
        assert!(record_dose(&w.conn, &admin, &f, date("2024-03-01")).is_err());
        assert!(record_dose(&w.conn, &admin, &dose(&w.mine, "12:00", "taken"), date("2024-03-01"))
            .is_err());
    }

    #[test]
    fn second_report_replaces_first() {
        let w = world();
        let admin = actor(UserRole::Admin, None, None);
        let first =
            record_dose(&w.conn, &admin, &dose(&w.mine, "20:00", "missed"), date("2024-03-01")).unwrap();
        let second =
            record_dose(&w.conn, &admin, &dose(&w.mine, "20:00", "late"), date("2024-03-01")).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.status, ConsumptionStatus::Late);
        let all = repository::list_consumption_records(&w.conn, &ConsumptionFilter::default()).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn doctor_history_is_scoped_and_searchable() {
        let w = world();
        let admin = actor(UserRole::Admin, None, None);
        let day = date("2024-03-01");
        record_dose(&w.conn, &admin, &dose(&w.mine, "08:00", "taken"), day).unwrap();
        record_dose(&w.conn, &admin, &dose(&w.mine, "20:00", "missed"), day).unwrap();
        record_dose(&w.conn, &admin, &dose(&w.other, "09:00", "late"), day).unwrap();

        let all = fetch_history(&w.conn, &admin, &HistoryQuery::default()).unwrap();
        assert_eq!(all.summary.total, 3);

        let doctor = actor(UserRole::Doctor, Some(w.doctor_id), None);
        let mine = fetch_history(&w.conn, &doctor, &HistoryQuery::default()).unwrap();
        assert_eq!(mine.summary.total, 2);
        assert_eq!(mine.records[0].patient_name, "John Smith");

        let missed = fetch_history(
            &w.conn,
            &doctor,
            &HistoryQuery {
                search: "MISS".into(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(missed.summary.missed, 1);
        assert_eq!(missed.records.len(), 1);

        let by_name = fetch_history(
            &w.conn,
            &admin,
            &HistoryQuery {
                search: "emily".into(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_name.records.len(), 1);

        let foreign = HistoryQuery {
            patient_id: Some(w.other.patient_id),
            ..Default::default()
        };
        assert!(matches!(fetch_history(&w.conn, &doctor, &foreign), Err(ServiceError::Forbidden)));
    }

    #[test]
    fn patients_use_own_records_endpoint() {
        let w = world();
        let me = actor(UserRole::Patient, None, Some(w.mine.patient_id));
        assert!(matches!(
            fetch_history(&w.conn, &me, &HistoryQuery::default()),
            Err(ServiceError::Forbidden)
        ));
        record_dose(&w.conn, &me, &dose(&w.mine, "08:00", "taken"), date("2024-03-01")).unwrap();
        assert_eq!(fetch_own_records(&w.conn, &me).unwrap().len(), 1);
    }
}
