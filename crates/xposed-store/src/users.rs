//! Local directory of principals.
//!
//! Identity lives with the external provider; this table only caches what
//! the server has seen so that stored user ids can be dereferenced later.

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;
use crate::models::User;
use crate::sql::{parse_enum, parse_ts, parse_uuid, ts};

impl Database {
    /// Insert or refresh a user record.
    pub fn upsert_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users (id, role, name, email, subscription_status,
                                subscription_expiry, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                role = excluded.role,
                name = excluded.name,
                email = excluded.email,
                subscription_status = excluded.subscription_status,
                subscription_expiry = excluded.subscription_expiry,
                last_seen_at = excluded.last_seen_at",
            params![
                user.id.to_string(),
                user.role.as_str(),
                user.name,
                user.email,
                user.subscription_status.as_str(),
                user.subscription_expiry.as_ref().map(ts),
                ts(&user.last_seen_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let user = self
            .conn()
            .query_row(
                "SELECT id, role, name, email, subscription_status, subscription_expiry,
                        last_seen_at
                 FROM users WHERE id = ?1",
                params![id.to_string()],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id_str: String = row.get(0)?;
    let role_str: String = row.get(1)?;
    let name: Option<String> = row.get(2)?;
    let email: Option<String> = row.get(3)?;
    let sub_str: String = row.get(4)?;
    let expiry_str: Option<String> = row.get(5)?;
    let seen_str: String = row.get(6)?;

    Ok(User {
        id: parse_uuid(0, &id_str)?,
        role: parse_enum(1, &role_str)?,
        name,
        email,
        subscription_status: parse_enum(4, &sub_str)?,
        subscription_expiry: expiry_str.map(|s| parse_ts(5, &s)).transpose()?,
        last_seen_at: parse_ts(6, &seen_str)?,
    })
}
