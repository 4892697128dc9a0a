use chrono::NaiveDate;
use uuid::Uuid;

use super::enums::{ConsumptionStatus, MedicationCategory, UserRole};

#[derive(Debug, Default)]
pub struct PatientFilter {
    pub doctor_id: Option<Uuid>,
    pub email: Option<String>,
    pub include_inactive: bool,
}

#[derive(Debug, Default)]
pub struct DoctorFilter {
    pub user_id: Option<Uuid>,
    pub include_inactive: bool,
}

#[derive(Debug, Default)]
pub struct MedicationFilter {
    pub category: Option<MedicationCategory>,
    pub include_inactive: bool,
}

#[derive(Debug, Default)]
pub struct ScheduleFilter {
    pub patient_id: Option<Uuid>,
    /// Restrict to any of these patients. An empty list matches nothing.
    pub patient_ids: Option<Vec<Uuid>>,
    pub include_inactive: bool,
}

#[derive(Debug, Default)]
pub struct ConsumptionFilter {
    pub patient_id: Option<Uuid>,
    /// Restrict to any of these patients. An empty list matches nothing.
    pub patient_ids: Option<Vec<Uuid>>,
    pub schedule_id: Option<Uuid>,
    pub status: Option<ConsumptionStatus>,
    pub date: Option<NaiveDate>,
    pub date_from: Option<NaiveDate>,
}

#[derive(Debug, Default)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub include_inactive: bool,
}
