use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid, timestamp_to_sql, SqlFilter};
use crate::db::DatabaseError;
use crate::models::enums::UserRole;
use crate::models::{UserFilter, UserProfile};

const USER_COLUMNS: &str = "id, email, name, role, specialization, license_number, phone,
     is_active, created_at, updated_at";

pub fn insert_user(conn: &Connection, user: &UserProfile) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, email, name, role, specialization, license_number, phone,
         is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            user.id.to_string(),
            user.email,
            user.name,
            user.role.as_str(),
            user.specialization,
            user.license_number,
            user.phone,
            user.is_active,
            timestamp_to_sql(user.created_at),
            timestamp_to_sql(user.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<UserProfile>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id.to_string()],
            user_row_from_rusqlite,
        )
        .optional()?;
    row.map(user_from_row).transpose()
}

/// Email lookup is case-insensitive, matching the unique index.
pub fn get_user_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<UserProfile>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER(?1)"),
            params![email.trim()],
            user_row_from_rusqlite,
        )
        .optional()?;
    row.map(user_from_row).transpose()
}

pub fn email_exists(conn: &Connection, email: &str) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE LOWER(email) = LOWER(?1)",
        params![email.trim()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_users(conn: &Connection, filter: &UserFilter) -> Result<Vec<UserProfile>, DatabaseError> {
    let mut f = SqlFilter::new();
    if !filter.include_inactive {
        f.raw("is_active = 1");
    }
    if let Some(role) = filter.role {
        f.eq("role = {p}", role.as_str());
    }
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users{} ORDER BY created_at DESC",
        f.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(f.params().as_slice(), user_row_from_rusqlite)?;

    let mut users = Vec::new();
    for row in rows {
        users.push(user_from_row(row?)?);
    }
    Ok(users)
}

/// Overwrite the mutable profile fields and bump `updated_at`.
pub fn update_user(conn: &Connection, user: &UserProfile) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET name = ?2, specialization = ?3, license_number = ?4, phone = ?5,
         is_active = ?6, updated_at = ?7 WHERE id = ?1",
        params![
            user.id.to_string(),
            user.name,
            user.specialization,
            user.license_number,
            user.phone,
            user.is_active,
            timestamp_to_sql(user.updated_at),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("user", user.id));
    }
    Ok(())
}

pub fn set_user_active(conn: &Connection, id: &Uuid, active: bool) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
        params![id.to_string(), active, timestamp_to_sql(Utc::now())],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("user", id));
    }
    Ok(())
}

// ═══════════════════════════════════════════
// Credentials
// ═══════════════════════════════════════════

/// Stored password verifier for one account.
#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub user_id: Uuid,
    pub password_hash: Vec<u8>,
    pub salt: Vec<u8>,
}

pub fn upsert_credential(conn: &Connection, cred: &StoredCredential) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO credentials (user_id, password_hash, salt, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(user_id) DO UPDATE SET
           password_hash = excluded.password_hash,
           salt = excluded.salt,
           updated_at = excluded.updated_at",
        params![
            cred.user_id.to_string(),
            cred.password_hash,
            cred.salt,
            timestamp_to_sql(Utc::now()),
        ],
    )?;
    Ok(())
}

pub fn get_credential(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Option<StoredCredential>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT password_hash, salt FROM credentials WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?)),
        )
        .optional()?;
    Ok(row.map(|(password_hash, salt)| StoredCredential {
        user_id: *user_id,
        password_hash,
        salt,
    }))
}

// ═══════════════════════════════════════════
// Row mapping
// ═══════════════════════════════════════════

struct UserRow {
    id: String,
    email: String,
    name: String,
    role: String,
    specialization: Option<String>,
    license_number: Option<String>,
    phone: Option<String>,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

fn user_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        role: row.get(3)?,
        specialization: row.get(4)?,
        license_number: row.get(5)?,
        phone: row.get(6)?,
        is_active: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn user_from_row(row: UserRow) -> Result<UserProfile, DatabaseError> {
    Ok(UserProfile {
        id: parse_uuid("users.id", &row.id)?,
        email: row.email,
        name: row.name,
        role: UserRole::from_str(&row.role)?,
        specialization: row.specialization,
        license_number: row.license_number,
        phone: row.phone,
        is_active: row.is_active,
        created_at: parse_timestamp("users.created_at", &row.created_at)?,
        updated_at: parse_timestamp("users.updated_at", &row.updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::test_fixtures;

    #[test]
    fn email_lookup_ignores_case_and_whitespace() {
        let conn = open_memory_database().unwrap();
        let user = test_fixtures::user("Admin@Beom-Med.com", UserRole::Admin);
        insert_user(&conn, &user).unwrap();

        let found = get_user_by_email(&conn, "  admin@beom-med.com ").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.role, UserRole::Admin);
        assert!(email_exists(&conn, "ADMIN@BEOM-MED.COM").unwrap());
        assert!(!email_exists(&conn, "nobody@beom-med.com").unwrap());
    }

    #[test]
    fn duplicate_email_is_rejected_by_index() {
        let conn = open_memory_database().unwrap();
        insert_user(&conn, &test_fixtures::user("a@b.com", UserRole::Patient)).unwrap();
        let err = insert_user(&conn, &test_fixtures::user("A@B.com", UserRole::Doctor));
        assert!(matches!(err, Err(DatabaseError::Sqlite(_))));
    }

    #[test]
    fn list_hides_inactive_unless_asked() {
        let conn = open_memory_database().unwrap();
        let a = test_fixtures::user("a@b.com", UserRole::Doctor);
        let b = test_fixtures::user("b@b.com", UserRole::Patient);
        insert_user(&conn, &a).unwrap();
        insert_user(&conn, &b).unwrap();
        set_user_active(&conn, &b.id, false).unwrap();

        assert_eq!(list_users(&conn, &UserFilter::default()).unwrap().len(), 1);
        let all = list_users(
            &conn,
            &UserFilter {
                include_inactive: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(all.len(), 2);

        let doctors = list_users(
            &conn,
            &UserFilter {
                role: Some(UserRole::Doctor),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(doctors.len(), 1);
        assert_eq!(doctors[0].id, a.id);
    }

    #[test]
    fn update_missing_user_is_not_found() {
        let conn = open_memory_database().unwrap();
        let ghost = test_fixtures::user("ghost@b.com", UserRole::Patient);
        let err = update_user(&conn, &ghost).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn credential_upsert_replaces_hash() {
        let conn = open_memory_database().unwrap();
        let user = test_fixtures::user("a@b.com", UserRole::Patient);
        insert_user(&conn, &user).unwrap();

        let mut cred = StoredCredential {
            user_id: user.id,
            password_hash: vec![1, 2, 3],
            salt: vec![9; 16],
        };
        upsert_credential(&conn, &cred).unwrap();
        cred.password_hash = vec![4, 5, 6];
        upsert_credential(&conn, &cred).unwrap();

        let stored = get_credential(&conn, &user.id).unwrap().unwrap();
        assert_eq!(stored.password_hash, vec![4, 5, 6]);
        assert_eq!(stored.salt, vec![9; 16]);
        assert!(get_credential(&conn, &Uuid::new_v4()).unwrap().is_none());
    }
}
