use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use xposed_shared::types::InstrumentType;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::WatchlistEntry;
use crate::sql::{parse_enum, parse_ts, parse_uuid, ts};

impl Database {
    /// Subscribe `user_id` to alerts for `category`.
    pub fn add_watch(
        &self,
        user_id: Uuid,
        category: InstrumentType,
        now: DateTime<Utc>,
    ) -> Result<WatchlistEntry> {
        let entry = WatchlistEntry {
            id: Uuid::new_v4(),
            user_id,
            category,
            created_at: now,
        };

        self.conn()
            .execute(
                "INSERT INTO watchlist (id, user_id, category, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    entry.id.to_string(),
                    entry.user_id.to_string(),
                    entry.category.as_str(),
                    ts(&entry.created_at),
                ],
            )
            .map_err(|e| {
                if StoreError::is_unique_violation(&e) {
                    StoreError::DuplicateWatch
                } else {
                    StoreError::Sqlite(e)
                }
            })?;

        Ok(entry)
    }

    pub fn list_watches_for_user(&self, user_id: Uuid) -> Result<Vec<WatchlistEntry>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, category, created_at
             FROM watchlist WHERE user_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![user_id.to_string()], row_to_entry)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every subscription to `category`, in subscription order.
    pub fn list_watchers(&self, category: InstrumentType) -> Result<Vec<WatchlistEntry>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, category, created_at
             FROM watchlist WHERE category = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![category.as_str()], row_to_entry)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete a watchlist entry owned by `user_id`.
    pub fn delete_watch(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let owner: Option<String> = self
            .conn()
            .query_row(
                "SELECT user_id FROM watchlist WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match owner {
            None => Err(StoreError::WatchlistEntryNotFound),
            Some(owner) if owner != user_id.to_string() => Err(StoreError::NotOwner),
            Some(_) => {
                self.conn()
                    .execute("DELETE FROM watchlist WHERE id = ?1", params![id.to_string()])?;
                Ok(())
            }
        }
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<WatchlistEntry> {
    let id_str: String = row.get(0)?;
    let user_str: String = row.get(1)?;
    let category_str: String = row.get(2)?;
    let created_str: String = row.get(3)?;

    Ok(WatchlistEntry {
        id: parse_uuid(0, &id_str)?,
        user_id: parse_uuid(1, &user_str)?,
        category: parse_enum(2, &category_str)?,
        created_at: parse_ts(3, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_crud() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("watch.db")).unwrap();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let entry = db
            .add_watch(alice, InstrumentType::FraudulentEmail, Utc::now())
            .unwrap();
        db.add_watch(alice, InstrumentType::FraudulentPhone, Utc::now())
            .unwrap();
        db.add_watch(bob, InstrumentType::FraudulentEmail, Utc::now())
            .unwrap();

        assert!(matches!(
            db.add_watch(alice, InstrumentType::FraudulentEmail, Utc::now()),
            Err(StoreError::DuplicateWatch)
        ));

        assert_eq!(db.list_watches_for_user(alice).unwrap().len(), 2);
        assert_eq!(db.list_watchers(InstrumentType::FraudulentEmail).unwrap().len(), 2);
        assert!(db
            .list_watchers(InstrumentType::FraudulentWebsite)
            .unwrap()
            .is_empty());

        assert!(matches!(db.delete_watch(entry.id, bob), Err(StoreError::NotOwner)));
        db.delete_watch(entry.id, alice).unwrap();
        assert!(matches!(
            db.delete_watch(entry.id, alice),
            Err(StoreError::WatchlistEntryNotFound)
        ));
        assert_eq!(db.list_watchers(InstrumentType::FraudulentEmail).unwrap().len(), 1);
    }
}
