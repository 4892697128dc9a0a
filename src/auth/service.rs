//! Sign-up, sign-in, sign-out, current user, own-profile updates.

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::password::{hash_password, verify_password, verify_without_credential};
use super::{AuthError, Session};
use crate::core_state::{CoreError, CoreState};
use crate::db::repository;
use crate::db::{DatabaseError, StoredCredential};
use crate::models::enums::UserRole;
use crate::models::{AuthUser, Doctor, UserProfile};
use crate::validation::{self, optional_text};

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: UserRole,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl SignUpForm {
    pub fn validate(&self) -> Result<(), AuthError> {
        validation::required("name", &self.name)?;
        validation::email("email", &self.email)?;
        validation::new_password(&self.password, &self.confirm_password)?;
        if self.role == UserRole::Doctor {
            validation::required_opt("specialization", self.specialization.as_deref())?;
            validation::required_opt("license_number", self.license_number.as_deref())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

impl SignInForm {
    pub fn validate(&self) -> Result<(), AuthError> {
        validation::required("email", &self.email)?;
        if self.password.is_empty() {
            return Err(validation::ValidationError::new(
                "password",
                "Please fill in all required fields",
            )
            .into());
        }
        Ok(())
    }
}

/// Returned to a client that just signed in or up.
#[derive(Debug, Clone, Serialize)]
pub struct SignedIn {
    pub token: String,
    pub user: AuthUser,
}

/// Fields a signed-in user may change on their own profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
}

impl From<CoreError> for AuthError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::LockPoisoned => AuthError::LockPoisoned,
            CoreError::Database(e) => AuthError::Database(e),
        }
    }
}

/// Create an account, then sign it in.
///
/// Doctor accounts also get a doctor profile linked by `user_id`, so the
/// new doctor shows up in the admin's doctor list straight away.
pub fn sign_up(core: &CoreState, form: &SignUpForm) -> Result<SignedIn, AuthError> {
    form.validate()?;
    let email = form.email.trim().to_string();

    let mut conn = core.open_db()?;
    if repository::email_exists(&conn, &email)? {
        return Err(AuthError::EmailAlreadyInUse);
    }

    let now = Utc::now();
    let profile = UserProfile {
        id: Uuid::new_v4(),
        email: email.clone(),
        name: form.name.trim().to_string(),
        role: form.role,
        specialization: optional_text(form.specialization.clone()),
        license_number: optional_text(form.license_number.clone()),
        phone: optional_text(form.phone.clone()),
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    let (password_hash, salt) = hash_password(&form.password);

    store_account(
        &mut conn,
        &profile,
        &StoredCredential {
            user_id: profile.id,
            password_hash,
            salt,
        },
    )?;

    tracing::info!(user_id = %profile.id, role = %profile.role, "Account created");
    open_session(core, &profile)
}

/// Writes the user row, its credential and (for doctors) the linked doctor
/// profile in one transaction. A concurrent sign-up that took the email
/// first trips the unique index and is reported as a duplicate.
fn store_account(
    conn: &mut Connection,
    profile: &UserProfile,
    credential: &StoredCredential,
) -> Result<(), AuthError> {
    let tx = conn.transaction().map_err(DatabaseError::from)?;
    repository::insert_user(&tx, profile).map_err(|e| {
        if e.is_unique_violation() {
            AuthError::EmailAlreadyInUse
        } else {
            AuthError::Database(e)
        }
    })?;
    repository::upsert_credential(&tx, credential)?;
    if profile.role == UserRole::Doctor {
        repository::insert_doctor(&tx, &doctor_profile_for(profile))?;
    }
    tx.commit().map_err(DatabaseError::from)?;
    Ok(())
}

fn doctor_profile_for(user: &UserProfile) -> Doctor {
    Doctor {
        id: Uuid::new_v4(),
        user_id: Some(user.id),
        name: user.name.clone(),
        email: user.email.clone(),
        specialization: user.specialization.clone().unwrap_or_default(),
        license_number: user.license_number.clone().unwrap_or_default(),
        phone: user.phone.clone().unwrap_or_default(),
        patient_ids: Vec::new(),
        is_active: true,
        created_at: user.created_at,
        updated_at: user.updated_at,
    }
}

pub fn sign_in(core: &CoreState, form: &SignInForm) -> Result<SignedIn, AuthError> {
    form.validate()?;
    let email = form.email.trim();

    if core.throttle()?.is_locked(email) {
        tracing::warn!("Sign-in refused, too many failures");
        return Err(AuthError::TooManyRequests);
    }

    let conn = core.open_db()?;
    let profile = match repository::get_user_by_email(&conn, email)? {
        Some(p) => p,
        None => {
            verify_without_credential(&form.password);
            core.throttle()?.record_failure(email);
            return Err(AuthError::UserNotFound);
        }
    };
    let verified = match repository::get_credential(&conn, &profile.id)? {
        Some(cred) => verify_password(&form.password, &cred.salt, &cred.password_hash),
        None => verify_without_credential(&form.password),
    };
    if !verified {
        core.throttle()?.record_failure(email);
        return Err(AuthError::WrongPassword);
    }
    if !profile.is_active {
        return Err(AuthError::UserDisabled);
    }

    core.throttle()?.clear(email);
    tracing::info!(user_id = %profile.id, "Signed in");
    open_session(core, &profile)
}

fn open_session(core: &CoreState, profile: &UserProfile) -> Result<SignedIn, AuthError> {
    let token = core.write_sessions()?.create(profile.id, profile.role);
    Ok(SignedIn {
        token,
        user: profile.to_auth_user(),
    })
}

/// Unknown or already-revoked tokens are ignored.
pub fn sign_out(core: &CoreState, token: &str) -> Result<(), AuthError> {
    if core.write_sessions()?.revoke(token) {
        tracing::info!("Signed out");
    }
    Ok(())
}

/// The session and profile behind a token, if the token is live and the
/// account is still active. A deactivated account loses its sessions.
pub fn current_user(
    core: &CoreState,
    token: &str,
) -> Result<Option<(Session, UserProfile)>, AuthError> {
    let Some(session) = core.resolve_session(token)? else {
        return Ok(None);
    };
    let conn = core.open_db()?;
    match repository::get_user(&conn, &session.user_id)? {
        Some(profile) if profile.is_active => Ok(Some((session, profile))),
        _ => {
            core.revoke_user_sessions(&session.user_id)?;
            Ok(None)
        }
    }
}

/// Apply an own-profile update. Only doctors carry specialization and
/// license number; the linked doctor profile is kept in step.
pub fn update_profile(
    conn: &Connection,
    user_id: &Uuid,
    update: &ProfileUpdate,
) -> Result<UserProfile, AuthError> {
    let mut profile = repository::get_user(conn, user_id)?.ok_or(AuthError::Unauthenticated)?;

    if let Some(name) = &update.name {
        profile.name = validation::required("name", name)?;
    }
    if let Some(phone) = &update.phone {
        profile.phone = optional_text(Some(phone.clone()));
    }
    if profile.role == UserRole::Doctor {
        if let Some(spec) = &update.specialization {
            profile.specialization = Some(validation::required("specialization", spec)?);
        }
        if let Some(license) = &update.license_number {
            profile.license_number = Some(validation::required("license_number", license)?);
        }
    }
    profile.updated_at = Utc::now();
    repository::update_user(conn, &profile)?;

    if profile.role == UserRole::Doctor {
        if let Some(mut doctor) = repository::get_doctor_by_user(conn, &profile.id)? {
            doctor.name = profile.name.clone();
            doctor.phone = profile.phone.clone().unwrap_or_default();
            doctor.specialization = profile.specialization.clone().unwrap_or_default();
            doctor.license_number = profile.license_number.clone().unwrap_or_default();
            repository::update_doctor(conn, &doctor)?;
        }
    }

    Ok(profile)
}
