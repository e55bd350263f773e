//! CRUD operations for [`Appeal`] records and appeal resolution.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use xposed_shared::appeal::{transition, AppealAction, AppealStatus};
use xposed_shared::risk::{classify, Classification};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Appeal, AppealResolution};
use crate::reports::{find_by_instrument, load_reviews, update_derived};
use crate::sql::{map_not_found, parse_enum, parse_ts, parse_uuid, ts};

const APPEAL_COLUMNS: &str =
    "id, instrument, user_id, reason, evidence, status, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a pending appeal for `instrument` by `user_id`.
    ///
    /// Fails with [`StoreError::DuplicateAppeal`] when the user already
    /// appealed this instrument and with [`StoreError::InstrumentNotFound`]
    /// when no report exists for it. Runs on the current connection state, so
    /// it joins a transaction opened with [`Database::begin_immediate`].
    pub fn create_appeal(
        &self,
        instrument: &str,
        user_id: Uuid,
        reason: &str,
        evidence: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Appeal> {
        let duplicate = self
            .conn()
            .query_row(
                "SELECT 1 FROM appeals WHERE user_id = ?1 AND instrument = ?2",
                params![user_id.to_string(), instrument],
                |_| Ok(()),
            )
            .optional()?;
        if duplicate.is_some() {
            return Err(StoreError::DuplicateAppeal);
        }

        if find_by_instrument(self.conn(), instrument)?.is_none() {
            return Err(StoreError::InstrumentNotFound);
        }

        let appeal = Appeal {
            id: Uuid::new_v4(),
            instrument: instrument.to_string(),
            user_id,
            reason: reason.to_string(),
            evidence: evidence.map(str::to_string),
            status: AppealStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        self.conn()
            .execute(
                "INSERT INTO appeals (id, instrument, user_id, reason, evidence, status,
                                      created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    appeal.id.to_string(),
                    appeal.instrument,
                    appeal.user_id.to_string(),
                    appeal.reason,
                    appeal.evidence,
                    appeal.status.as_str(),
                    ts(&appeal.created_at),
                    ts(&appeal.updated_at),
                ],
            )
            .map_err(|e| {
                if StoreError::is_unique_violation(&e) {
                    StoreError::DuplicateAppeal
                } else {
                    StoreError::Sqlite(e)
                }
            })?;

        Ok(appeal)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_appeal(&self, id: Uuid) -> Result<Appeal> {
        map_not_found(
            self.conn().query_row(
                &format!("SELECT {APPEAL_COLUMNS} FROM appeals WHERE id = ?1"),
                params![id.to_string()],
                row_to_appeal,
            ),
            StoreError::AppealNotFound,
        )
    }

    /// Appeals newest first, optionally restricted to one status.
    pub fn list_appeals(&self, status: Option<AppealStatus>) -> Result<Vec<Appeal>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {APPEAL_COLUMNS} FROM appeals
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![status.map(|s| s.as_str())], row_to_appeal)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count_appeals(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM appeals", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ------------------------------------------------------------------
    // Resolve
    // ------------------------------------------------------------------

    /// Apply an admin decision to a pending appeal.
    ///
    /// Approval hides the report for the appealed instrument: it is marked
    /// suppressed, the admin visibility override is cleared, and the report
    /// is reclassified. Report and appeal are written in one transaction.
    pub fn resolve_appeal(
        &mut self,
        id: Uuid,
        action: AppealAction,
        now: DateTime<Utc>,
    ) -> Result<AppealResolution> {
        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut appeal = map_not_found(
            tx.query_row(
                &format!("SELECT {APPEAL_COLUMNS} FROM appeals WHERE id = ?1"),
                params![id.to_string()],
                row_to_appeal,
            ),
            StoreError::AppealNotFound,
        )?;

        let next = transition(appeal.status, action)?;

        let report = match action {
            AppealAction::Approve => {
                let mut report = find_by_instrument(&tx, &appeal.instrument)?
                    .ok_or(StoreError::ReportNotFound)?;
                let hidden = classify(Classification {
                    suppressed: true,
                    force_public: false,
                    ..report.classification()
                });
                report.apply(hidden, now);
                update_derived(&tx, &report)?;
                report.reviews = load_reviews(&tx, report.id)?;
                Some(report)
            }
            AppealAction::Reject => None,
        };

        appeal.status = next;
        appeal.updated_at = now;
        tx.execute(
            "UPDATE appeals SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![appeal.id.to_string(), appeal.status.as_str(), ts(&now)],
        )?;

        tx.commit()?;
        Ok(AppealResolution { appeal, report })
    }
}

fn row_to_appeal(row: &rusqlite::Row<'_>) -> rusqlite::Result<Appeal> {
    let id_str: String = row.get(0)?;
    let instrument: String = row.get(1)?;
    let user_str: String = row.get(2)?;
    let reason: String = row.get(3)?;
    let evidence: Option<String> = row.get(4)?;
    let status_str: String = row.get(5)?;
    let created_str: String = row.get(6)?;
    let updated_str: String = row.get(7)?;

    Ok(Appeal {
        id: parse_uuid(0, &id_str)?,
        instrument,
        user_id: parse_uuid(2, &user_str)?,
        reason,
        evidence,
        status: parse_enum(5, &status_str)?,
        created_at: parse_ts(6, &created_str)?,
        updated_at: parse_ts(7, &updated_str)?,
    })
}
