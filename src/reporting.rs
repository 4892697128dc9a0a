//! Compliance figures and the per-role dashboard statistics.
//!
//! Compliance is the share of recorded doses that were taken, on time or
//! late. Every function takes "now" explicitly; callers pass the local
//! clock.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::authorization::{self, Actor};
use crate::db::{repository, DatabaseError};
use crate::error::ServiceError;
use crate::models::enums::{ConsumptionStatus, UserRole};
use crate::models::{
    ConsumptionFilter, ConsumptionRecord, MedicationSchedule, PatientFilter, ScheduleFilter,
};

/// Days looked back by the patient's "missed this week" card.
const MISSED_LOOKBACK_DAYS: i64 = 7;

// ═══════════════════════════════════════════
// Compliance
// ═══════════════════════════════════════════

/// Percentage of `records` taken or late, rounded half away from zero.
/// An empty set is 0.
pub fn compliance_rate(records: &[ConsumptionRecord]) -> u8 {
    if records.is_empty() {
        return 0;
    }
    let taken = records
        .iter()
        .filter(|r| r.status.counts_as_taken())
        .count();
    (100.0 * taken as f64 / records.len() as f64).round() as u8
}

pub fn patient_compliance(conn: &Connection, patient_id: &Uuid) -> Result<u8, DatabaseError> {
    let records = repository::list_consumption_records(
        conn,
        &ConsumptionFilter {
            patient_id: Some(*patient_id),
            ..Default::default()
        },
    )?;
    Ok(compliance_rate(&records))
}

/// Rounded mean of per-patient rates; 0 with no patients.
pub fn average_compliance(rates: &[u8]) -> u8 {
    if rates.is_empty() {
        return 0;
    }
    let sum: u32 = rates.iter().map(|&r| u32::from(r)).sum();
    (f64::from(sum) / rates.len() as f64).round() as u8
}

/// Summary cards above the history tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusBreakdown {
    pub total: usize,
    pub taken: usize,
    pub late: usize,
    pub missed: usize,
}

impl StatusBreakdown {
    pub fn of<'a>(records: impl IntoIterator<Item = &'a ConsumptionRecord>) -> Self {
        let mut b = Self::default();
        for r in records {
            b.total += 1;
            match r.status {
                ConsumptionStatus::Taken => b.taken += 1,
                ConsumptionStatus::Late => b.late += 1,
                ConsumptionStatus::Missed => b.missed += 1,
            }
        }
        b
    }
}

/// Compliance card on the patient detail page.
#[derive(Debug, Clone, Serialize)]
pub struct PatientCompliance {
    pub patient_id: Uuid,
    pub rate: u8,
    pub breakdown: StatusBreakdown,
}

/// Admins see any patient, doctors only their own.
pub fn fetch_patient_compliance(
    conn: &Connection,
    actor: &Actor,
    patient_id: &Uuid,
) -> Result<PatientCompliance, ServiceError> {
    authorization::require_role(actor, &[UserRole::Admin, UserRole::Doctor])?;
    authorization::authorize_patient(conn, actor, patient_id)?;
    let records = repository::list_consumption_records(
        conn,
        &ConsumptionFilter {
            patient_id: Some(*patient_id),
            ..Default::default()
        },
    )?;
    Ok(PatientCompliance {
        patient_id: *patient_id,
        rate: compliance_rate(&records),
        breakdown: StatusBreakdown::of(&records),
    })
}

// ═══════════════════════════════════════════
// Dashboards
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdminStats {
    pub total_patients: u32,
    pub total_doctors: u32,
    pub total_medications: u32,
    pub missed_today: usize,
    pub compliance_today: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DoctorStats {
    pub total_patients: usize,
    pub average_compliance: u8,
    pub missed_today: usize,
    pub schedules_today: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatientStats {
    pub schedules_today: usize,
    pub compliance: u8,
    pub missed_this_week: usize,
    pub upcoming_reminders: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum DashboardStats {
    Admin(AdminStats),
    Doctor(DoctorStats),
    Patient(PatientStats),
}

pub fn dashboard(
    conn: &Connection,
    actor: &Actor,
    now: NaiveDateTime,
) -> Result<DashboardStats, DatabaseError> {
    let stats = match actor.role {
        UserRole::Admin => DashboardStats::Admin(admin_stats(conn, now.date())?),
        UserRole::Doctor => DashboardStats::Doctor(match actor.doctor_id {
            Some(id) => doctor_stats(conn, &id, now.date())?,
            None => DoctorStats::default(),
        }),
        UserRole::Patient => DashboardStats::Patient(match actor.patient_id {
            Some(id) => patient_stats(conn, &id, now)?,
            None => PatientStats::default(),
        }),
    };
    tracing::debug!(user_id = %actor.user_id, role = %actor.role, "Dashboard computed");
    Ok(stats)
}

pub fn admin_stats(conn: &Connection, today: NaiveDate) -> Result<AdminStats, DatabaseError> {
    let today_records = repository::list_consumption_records(
        conn,
        &ConsumptionFilter {
            date: Some(today),
            ..Default::default()
        },
    )?;
    Ok(AdminStats {
        total_patients: repository::count_active_patients(conn)?,
        total_doctors: repository::count_active_doctors(conn)?,
        total_medications: repository::count_active_medications(conn)?,
        missed_today: StatusBreakdown::of(&today_records).missed,
        compliance_today: compliance_rate(&today_records),
    })
}

pub fn doctor_stats(
    conn: &Connection,
    doctor_id: &Uuid,
    today: NaiveDate,
) -> Result<DoctorStats, DatabaseError> {
    let patients = repository::list_patients(
        conn,
        &PatientFilter {
            doctor_id: Some(*doctor_id),
            ..Default::default()
        },
    )?;
    if patients.is_empty() {
        return Ok(DoctorStats::default());
    }
    let ids: Vec<Uuid> = patients.iter().map(|p| p.id).collect();

    let records = repository::list_consumption_records(
        conn,
        &ConsumptionFilter {
            patient_ids: Some(ids.clone()),
            ..Default::default()
        },
    )?;
    let mut by_patient: HashMap<Uuid, Vec<ConsumptionRecord>> = HashMap::new();
    let mut missed_today = 0;
    for r in records {
        if r.date == today && r.status == ConsumptionStatus::Missed {
            missed_today += 1;
        }
        by_patient.entry(r.patient_id).or_default().push(r);
    }
    let rates: Vec<u8> = ids
        .iter()
        .map(|id| by_patient.get(id).map(|rs| compliance_rate(rs)).unwrap_or(0))
        .collect();

    let schedules = repository::list_schedules(
        conn,
        &ScheduleFilter {
            patient_ids: Some(ids),
            ..Default::default()
        },
    )?;

    Ok(DoctorStats {
        total_patients: patients.len(),
        average_compliance: average_compliance(&rates),
        missed_today,
        schedules_today: schedules.iter().filter(|s| s.covers(today)).count(),
    })
}

pub fn patient_stats(
    conn: &Connection,
    patient_id: &Uuid,
    now: NaiveDateTime,
) -> Result<PatientStats, DatabaseError> {
    let today = now.date();
    let schedules = active_schedules(conn, patient_id)?;
    let records = repository::list_consumption_records(
        conn,
        &ConsumptionFilter {
            patient_id: Some(*patient_id),
            ..Default::default()
        },
    )?;

    let week_start = today - Duration::days(MISSED_LOOKBACK_DAYS);
    let missed_this_week = records
        .iter()
        .filter(|r| r.date >= week_start && r.status == ConsumptionStatus::Missed)
        .count();
    let doses = todays_doses(&schedules, &records, now);

    Ok(PatientStats {
        schedules_today: doses.len(),
        compliance: compliance_rate(&records),
        missed_this_week,
        upcoming_reminders: doses
            .iter()
            .filter(|d| d.status == SlotStatus::Upcoming)
            .count(),
    })
}

fn active_schedules(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<MedicationSchedule>, DatabaseError> {
    repository::list_schedules(
        conn,
        &ScheduleFilter {
            patient_id: Some(*patient_id),
            ..Default::default()
        },
    )
}

// ═══════════════════════════════════════════
// Daily timeline
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Taken,
    Late,
    Missed,
    /// Later today, nothing recorded yet.
    Upcoming,
    /// Time has passed and nothing was recorded.
    Pending,
}

impl From<ConsumptionStatus> for SlotStatus {
    fn from(status: ConsumptionStatus) -> Self {
        match status {
            ConsumptionStatus::Taken => Self::Taken,
            ConsumptionStatus::Late => Self::Late,
            ConsumptionStatus::Missed => Self::Missed,
        }
    }
}

/// One dose on the patient's "today" page.
#[derive(Debug, Clone, Serialize)]
pub struct DoseSlot {
    pub schedule_id: Uuid,
    pub medication_name: String,
    pub dosage: String,
    pub time: String,
    pub instructions: Option<String>,
    pub status: SlotStatus,
    pub actual_time: Option<String>,
    pub record_id: Option<Uuid>,
}

/// One slot per dose time of every schedule covering today, ordered by
/// time.
pub fn todays_doses(
    schedules: &[MedicationSchedule],
    records: &[ConsumptionRecord],
    now: NaiveDateTime,
) -> Vec<DoseSlot> {
    let today = now.date();
    let clock = now.format("%H:%M").to_string();

    let mut slots: Vec<DoseSlot> = schedules
        .iter()
        .filter(|s| s.covers(today))
        .flat_map(|s| {
            let clock = &clock;
            s.times.iter().map(move |time| {
                let record = records
                    .iter()
                    .find(|r| r.schedule_id == s.id && r.date == today && &r.scheduled_time == time);
                let status = match record {
                    Some(r) => r.status.into(),
                    None if time.as_str() > clock.as_str() => SlotStatus::Upcoming,
                    None => SlotStatus::Pending,
                };
                DoseSlot {
                    schedule_id: s.id,
                    medication_name: s.medication_name.clone(),
                    dosage: s.dosage.clone(),
                    time: time.clone(),
                    instructions: s.instructions.clone(),
                    status,
                    actual_time: record.and_then(|r| r.actual_time.clone()),
                    record_id: record.map(|r| r.id),
                }
            })
        })
        .collect();
    slots.sort_by(|a, b| a.time.cmp(&b.time));
    slots
}

/// The signed-in patient's timeline for today. Unlinked patient accounts
/// get an empty list.
pub fn own_timeline(
    conn: &Connection,
    actor: &Actor,
    now: NaiveDateTime,
) -> Result<Vec<DoseSlot>, DatabaseError> {
    let Some(patient_id) = actor.patient_id else {
        return Ok(Vec::new());
    };
    let schedules = active_schedules(conn, &patient_id)?;
    let records = repository::list_consumption_records(
        conn,
        &ConsumptionFilter {
            patient_id: Some(patient_id),
            date: Some(now.date()),
            ..Default::default()
        },
    )?;
    Ok(todays_doses(&schedules, &records, now))
}
