use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    /// Linked sign-in account, if the doctor registered themselves.
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub specialization: String,
    pub license_number: String,
    pub phone: String,
    pub patient_ids: Vec<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
