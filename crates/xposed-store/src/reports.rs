//! Report storage: review insertion, derived-field recomputation, listings.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use xposed_shared::risk::{became_public, classify, Classification};
use xposed_shared::types::{InstrumentType, VerificationStatus};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{NewReview, Page, Report, Review, ReviewOutcome, ThreatStats};
use crate::sql::{map_not_found, parse_enum, parse_ts, parse_uuid, ts};

const REPORT_COLUMNS: &str = "id, instrument, instrument_type, review_count, risk_level, \
     is_public, force_public, suppressed, verification_status, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Write paths
    // ------------------------------------------------------------------

    /// Append `review` to the report for `instrument`, creating the report if
    /// this is the first sighting.
    ///
    /// The duplicate check, the insert and the reclassification run in one
    /// immediate transaction; a second review from the same user fails with
    /// [`StoreError::DuplicateReview`] and leaves the report untouched.
    pub fn record_review(
        &mut self,
        instrument: &str,
        instrument_type: InstrumentType,
        review: &NewReview,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome> {
        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = find_by_instrument(&tx, instrument)?;
        let is_new_threat = existing.is_none();
        let mut report = match existing {
            Some(report) if report.instrument_type != instrument_type => {
                return Err(StoreError::InstrumentTypeMismatch {
                    instrument: instrument.to_string(),
                    existing: report.instrument_type,
                });
            }
            Some(report) => report,
            None => {
                let report = Report::new(instrument, instrument_type, now);
                insert_report(&tx, &report)?;
                report
            }
        };

        if review_exists(&tx, report.id, review.user_id)? {
            return Err(StoreError::DuplicateReview);
        }
        insert_review(&tx, report.id, review, now)?;

        let before = report.classification();
        let review_count = count_reviews(&tx, report.id)?;
        let after = classify(Classification {
            review_count,
            ..before
        });
        report.apply(after, now);
        update_derived(&tx, &report)?;

        report.reviews = load_reviews(&tx, report.id)?;
        tx.commit()?;

        Ok(ReviewOutcome {
            report,
            is_new_threat,
            became_public: became_public(&before, &after),
        })
    }

    /// Mark a report verified. Idempotent.
    pub fn verify_report(&mut self, id: Uuid, now: DateTime<Utc>) -> Result<Report> {
        self.update_report(id, now, |c| Classification {
            verification_status: VerificationStatus::Verified,
            ..c
        })
        .map(|(report, _)| report)
    }

    /// Set the admin visibility override and reclassify. Returns the report
    /// and whether it moved from private to public.
    pub fn set_force_public(
        &mut self,
        id: Uuid,
        force_public: bool,
        now: DateTime<Utc>,
    ) -> Result<(Report, bool)> {
        self.update_report(id, now, |c| Classification { force_public, ..c })
    }

    /// Load, adjust the override fields with `edit`, reclassify, persist.
    fn update_report<F>(&mut self, id: Uuid, now: DateTime<Utc>, edit: F) -> Result<(Report, bool)>
    where
        F: FnOnce(Classification) -> Classification,
    {
        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut report = map_not_found(
            tx.query_row(
                &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1"),
                params![id.to_string()],
                row_to_report,
            ),
            StoreError::ReportNotFound,
        )?;

        let before = report.classification();
        let after = classify(edit(before));
        report.apply(after, now);
        update_derived(&tx, &report)?;

        report.reviews = load_reviews(&tx, report.id)?;
        tx.commit()?;
        Ok((report, became_public(&before, &after)))
    }

    // ------------------------------------------------------------------
    // Read paths
    // ------------------------------------------------------------------

    pub fn find_report_by_instrument(&self, instrument: &str) -> Result<Option<Report>> {
        let Some(mut report) = find_by_instrument(self.conn(), instrument)? else {
            return Ok(None);
        };
        report.reviews = load_reviews(self.conn(), report.id)?;
        Ok(Some(report))
    }

    /// Public reports, newest first. `page` is 1-based.
    pub fn list_public_reports(
        &self,
        instrument_type: Option<InstrumentType>,
        page: u32,
        limit: u32,
    ) -> Result<Page<Report>> {
        let page = page.max(1);
        let limit = limit.max(1);
        let type_filter = instrument_type.map(|t| t.as_str());
        let offset = u64::from(page - 1) * u64::from(limit);

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports
             WHERE is_public = 1 AND (?1 IS NULL OR instrument_type = ?1)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt.query_map(params![type_filter, limit, offset as i64], row_to_report)?;
        let reports = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        let data = self.with_reviews(reports)?;

        let total: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM reports
             WHERE is_public = 1 AND (?1 IS NULL OR instrument_type = ?1)",
            params![type_filter],
            |row| row.get(0),
        )?;
        let total = total as u64;

        Ok(Page {
            total,
            current_page: page,
            total_pages: total.div_ceil(u64::from(limit)) as u32,
            data,
        })
    }

    /// Every report, newest first, optionally filtered. No pagination.
    pub fn list_reports(
        &self,
        instrument_type: Option<InstrumentType>,
        instrument: Option<&str>,
    ) -> Result<Vec<Report>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports
             WHERE (?1 IS NULL OR instrument_type = ?1)
               AND (?2 IS NULL OR instrument = ?2)
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(
            params![instrument_type.map(|t| t.as_str()), instrument],
            row_to_report,
        )?;
        let reports = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        self.with_reviews(reports)
    }

    pub fn count_public(&self) -> Result<u64> {
        self.count_where("is_public = 1", params![])
    }

    pub fn count_all(&self) -> Result<u64> {
        self.count_where("1 = 1", params![])
    }

    pub fn count_by_verification(&self, status: VerificationStatus) -> Result<u64> {
        self.count_where("verification_status = ?1", params![status.as_str()])
    }

    pub fn threat_stats(&self) -> Result<ThreatStats> {
        Ok(ThreatStats {
            total_threats: self.count_all()?,
            public_threats: self.count_public()?,
            verified_threats: self.count_by_verification(VerificationStatus::Verified)?,
        })
    }

    fn count_where(&self, predicate: &str, params: &[&dyn rusqlite::ToSql]) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM reports WHERE {predicate}"),
            params,
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn with_reviews(&self, mut reports: Vec<Report>) -> Result<Vec<Report>> {
        for report in &mut reports {
            report.reviews = load_reviews(self.conn(), report.id)?;
        }
        Ok(reports)
    }
}

// ---------------------------------------------------------------------------
// Helpers (usable inside and outside a transaction)
// ---------------------------------------------------------------------------

pub(crate) fn find_by_instrument(conn: &Connection, instrument: &str) -> Result<Option<Report>> {
    let report = conn
        .query_row(
            &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE instrument = ?1"),
            params![instrument],
            row_to_report,
        )
        .optional()?;
    Ok(report)
}

fn insert_report(conn: &Connection, report: &Report) -> Result<()> {
    conn.execute(
        "INSERT INTO reports (id, instrument, instrument_type, review_count, risk_level,
                              is_public, force_public, suppressed, verification_status,
                              created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            report.id.to_string(),
            report.instrument,
            report.instrument_type.as_str(),
            report.review_count,
            report.risk_level.as_str(),
            report.is_public,
            report.force_public,
            report.suppressed,
            report.verification_status.as_str(),
            ts(&report.created_at),
            ts(&report.updated_at),
        ],
    )?;
    Ok(())
}

/// Persist every derived/override field of `report`.
pub(crate) fn update_derived(conn: &Connection, report: &Report) -> Result<()> {
    conn.execute(
        "UPDATE reports
         SET review_count = ?2, risk_level = ?3, is_public = ?4, force_public = ?5,
             suppressed = ?6, verification_status = ?7, updated_at = ?8
         WHERE id = ?1",
        params![
            report.id.to_string(),
            report.review_count,
            report.risk_level.as_str(),
            report.is_public,
            report.force_public,
            report.suppressed,
            report.verification_status.as_str(),
            ts(&report.updated_at),
        ],
    )?;
    Ok(())
}

fn review_exists(conn: &Connection, report_id: Uuid, user_id: Uuid) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM reviews WHERE report_id = ?1 AND user_id = ?2",
            params![report_id.to_string(), user_id.to_string()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn insert_review(
    conn: &Connection,
    report_id: Uuid,
    review: &NewReview,
    now: DateTime<Utc>,
) -> Result<()> {
    let aliases = serde_json::to_string(&normalize_aliases(&review.aliases))?;
    conn.execute(
        "INSERT INTO reviews (id, report_id, user_id, description, aliases, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            Uuid::new_v4().to_string(),
            report_id.to_string(),
            review.user_id.to_string(),
            review.description,
            aliases,
            ts(&now),
        ],
    )
    .map_err(|e| {
        if StoreError::is_unique_violation(&e) {
            StoreError::DuplicateReview
        } else {
            StoreError::Sqlite(e)
        }
    })?;
    Ok(())
}

fn count_reviews(conn: &Connection, report_id: Uuid) -> Result<u32> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM reviews WHERE report_id = ?1",
        params![report_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub(crate) fn load_reviews(conn: &Connection, report_id: Uuid) -> Result<Vec<Review>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, description, aliases, created_at
         FROM reviews WHERE report_id = ?1
         ORDER BY rowid ASC",
    )?;
    let rows = stmt.query_map(params![report_id.to_string()], |row| {
        let user_str: String = row.get(0)?;
        let description: String = row.get(1)?;
        let aliases_json: String = row.get(2)?;
        let created_str: String = row.get(3)?;

        let aliases: Vec<String> = serde_json::from_str(&aliases_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Review {
            user_id: parse_uuid(0, &user_str)?,
            description,
            aliases,
            created_at: parse_ts(3, &created_str)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Aliases are a set: trimmed, empty entries dropped, first occurrence kept.
fn normalize_aliases(aliases: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(aliases.len());
    for alias in aliases {
        let alias = alias.trim();
        if !alias.is_empty() && !out.iter().any(|a| a == alias) {
            out.push(alias.to_string());
        }
    }
    out
}

/// Map a `rusqlite::Row` selected with `REPORT_COLUMNS` to a [`Report`]
/// with an empty review list.
pub(crate) fn row_to_report(row: &rusqlite::Row<'_>) -> rusqlite::Result<Report> {
    let id_str: String = row.get(0)?;
    let instrument: String = row.get(1)?;
    let type_str: String = row.get(2)?;
    let review_count: u32 = row.get(3)?;
    let risk_str: String = row.get(4)?;
    let is_public: bool = row.get(5)?;
    let force_public: bool = row.get(6)?;
    let suppressed: bool = row.get(7)?;
    let verification_str: String = row.get(8)?;
    let created_str: String = row.get(9)?;
    let updated_str: String = row.get(10)?;

    Ok(Report {
        id: parse_uuid(0, &id_str)?,
        instrument,
        instrument_type: parse_enum(2, &type_str)?,
        reviews: Vec::new(),
        review_count,
        risk_level: parse_enum(4, &risk_str)?,
        is_public,
        force_public,
        suppressed,
        verification_status: parse_enum(8, &verification_str)?,
        created_at: parse_ts(9, &created_str)?,
        updated_at: parse_ts(10, &updated_str)?,
    })
}
