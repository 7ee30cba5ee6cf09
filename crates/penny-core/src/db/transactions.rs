//! Transaction operations
//!
//! Every query is scoped by `user_id`; a row owned by someone else behaves
//! exactly like a missing row.

use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use rust_decimal::Decimal;

use super::{parse_datetime, Database, TransactionStore};
use crate::error::{Error, Result};
use crate::models::{
    validate_amount, NewTransaction, TransactionRecord, TransactionType, TransactionUpdate,
};

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, description, amount, type, category, date, created_at FROM transactions";

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn row_to_transaction(row: &Row) -> rusqlite::Result<TransactionRecord> {
    let amount: String = row.get(3)?;
    let kind: String = row.get(4)?;
    let date: String = row.get(6)?;
    let created_at: String = row.get(7)?;

    Ok(TransactionRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        description: row.get(2)?,
        amount: Decimal::from_str(&amount).map_err(|e| conversion_error(3, e))?,
        kind: TransactionType::from_str(&kind).map_err(|e| {
            conversion_error(4, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?,
        category: row.get(5)?,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| conversion_error(6, e))?,
        created_at: parse_datetime(&created_at).map_err(|e| conversion_error(7, e))?,
    })
}

/// Trimmed category, or None when blank
fn normalize_category(category: Option<&str>) -> Option<String> {
    category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
}

fn require_description(description: &str) -> Result<String> {
    let description = description.trim();
    if description.is_empty() {
        return Err(Error::InvalidInput("description must not be empty".into()));
    }
    Ok(description.to_string())
}

impl Database {
    /// Insert a transaction for a user
    ///
    /// Amounts are stored as magnitudes; `kind` carries the direction.
    pub fn insert_transaction(
        &self,
        user_id: &str,
        tx: &NewTransaction,
    ) -> Result<TransactionRecord> {
        let description = require_description(&tx.description)?;
        let amount = validate_amount(tx.amount)?.abs();
        let category = normalize_category(tx.category.as_deref());
        let created_at = Utc::now();

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO transactions
                (user_id, description, amount, type, category, date, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                description,
                amount.to_string(),
                tx.kind.as_str(),
                category,
                tx.date.format("%Y-%m-%d").to_string(),
                created_at.to_rfc3339(),
            ],
        )?;

        Ok(TransactionRecord {
            id: conn.last_insert_rowid(),
            user_id: user_id.to_string(),
            description,
            amount,
            kind: tx.kind,
            category,
            date: tx.date,
            created_at,
        })
    }

    /// All of a user's transactions, newest first
    pub fn list_user_transactions(&self, user_id: &str) -> Result<Vec<TransactionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE user_id = ? ORDER BY date DESC, id DESC",
            SELECT_COLUMNS
        ))?;

        let records = stmt
            .query_map(params![user_id], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// A single transaction, if it exists and belongs to the user
    pub fn get_user_transaction(
        &self,
        user_id: &str,
        id: i64,
    ) -> Result<Option<TransactionRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("{} WHERE id = ? AND user_id = ?", SELECT_COLUMNS),
                params![id, user_id],
                row_to_transaction,
            )
            .optional()?;
        Ok(record)
    }

    /// Apply a partial update to a user's transaction
    pub fn update_transaction(
        &self,
        user_id: &str,
        id: i64,
        update: &TransactionUpdate,
    ) -> Result<TransactionRecord> {
        let mut record = self
            .get_user_transaction(user_id, id)?
            .ok_or_else(|| Error::NotFound("Transaction not found".into()))?;

        if let Some(ref description) = update.description {
            record.description = require_description(description)?;
        }
        if let Some(amount) = update.amount {
            record.amount = validate_amount(amount)?.abs();
        }
        if update.category.is_some() {
            record.category = normalize_category(update.category.as_deref());
        }
        if let Some(date) = update.date {
            record.date = date;
        }

        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE transactions
            SET description = ?, amount = ?, category = ?, date = ?
            WHERE id = ? AND user_id = ?
            "#,
            params![
                record.description,
                record.amount.to_string(),
                record.category,
                record.date.format("%Y-%m-%d").to_string(),
                id,
                user_id,
            ],
        )?;

        Ok(record)
    }

    /// Delete a user's transaction
    pub fn delete_transaction(&self, user_id: &str, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM transactions WHERE id = ? AND user_id = ?",
            params![id, user_id],
        )?;

        if deleted == 0 {
            return Err(Error::NotFound("Transaction not found".into()));
        }
        Ok(())
    }
}

impl TransactionStore for Database {
    fn find_by_user_and_period(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TransactionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE user_id = ? AND date >= ? AND date <= ? ORDER BY date, id",
            SELECT_COLUMNS
        ))?;

        let records = stmt
            .query_map(
                params![
                    user_id,
                    start.format("%Y-%m-%d").to_string(),
                    end.format("%Y-%m-%d").to_string(),
                ],
                row_to_transaction,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
