//! CSV import for ledger exports
//!
//! Both exports are plain delimited text with a header row. Headers are
//! normalized (trimmed, lower-cased, spaces to underscores) before any column
//! lookup, so `Account Code`, ` account code ` and `account_code` are the same
//! column.

use std::collections::BTreeMap;
use std::io::Read;
use std::str::FromStr;

use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{LedgerRow, Side};

/// Normalized name of the debit column
pub const DEBIT_COLUMN: &str = "debit";
/// Normalized name of the credit column
pub const CREDIT_COLUMN: &str = "credit";

/// Describes how to read one side's export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSchema {
    pub side: Side,
    /// Normalized name of the key column
    pub key_column: String,
}

impl LedgerSchema {
    /// Accounting export keyed by `account_code`
    pub fn accounting() -> Self {
        Self::for_side(Side::Accounting)
    }

    /// Internal ledger export keyed by `gl_code`
    pub fn ledger() -> Self {
        Self::for_side(Side::Ledger)
    }

    pub fn for_side(side: Side) -> Self {
        Self {
            side,
            key_column: side.default_key_column().to_string(),
        }
    }

    /// Use a different key column (normalized the same way as headers)
    pub fn with_key_column(mut self, column: &str) -> Self {
        self.key_column = normalize_column_name(column);
        self
    }
}

/// Lower-case, trim, and replace spaces with underscores
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Column positions resolved from the header row
struct ColumnIndex {
    key: usize,
    debit: usize,
    credit: usize,
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord, schema: &LedgerSchema) -> Result<Self> {
        let normalized: Vec<String> = headers.iter().map(normalize_column_name).collect();

        let find = |column: &str| -> Result<usize> {
            normalized
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| Error::MissingColumn {
                    ledger: schema.side.to_string(),
                    column: column.to_string(),
                })
        };

        Ok(Self {
            key: find(&schema.key_column)?,
            debit: find(DEBIT_COLUMN)?,
            credit: find(CREDIT_COLUMN)?,
        })
    }
}

/// Parse a ledger export into rows
///
/// Rows that repeat a key are summed into a single row. Fails on a missing
/// required column, a blank key, or an amount that is not a number.
pub fn read_ledger<R: Read>(reader: R, schema: &LedgerSchema) -> Result<Vec<LedgerRow>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::Fields)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let columns = ColumnIndex::resolve(&headers, schema)?;

    let mut by_key: BTreeMap<String, LedgerRow> = BTreeMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut record_count = 0usize;

    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        record_count += 1;

        let key = record.get(columns.key).unwrap_or("").trim().to_string();
        if key.is_empty() {
            return Err(Error::InvalidData(format!(
                "{} ledger, line {}: empty {}",
                schema.side, line, schema.key_column
            )));
        }

        let debit = amount_at(&record, columns.debit, DEBIT_COLUMN, schema.side, line)?;
        let credit = amount_at(&record, columns.credit, CREDIT_COLUMN, schema.side, line)?;

        match by_key.get_mut(&key) {
            Some(existing) => {
                debug!(side = %schema.side, key = %key, "Summing repeated key");
                existing.debit += debit;
                existing.credit += credit;
            }
            None => {
                order.push(key.clone());
                by_key.insert(key.clone(), LedgerRow::new(key, debit, credit));
            }
        }
    }

    let rows: Vec<LedgerRow> = order
        .into_iter()
        .filter_map(|key| by_key.remove(&key))
        .collect();

    debug!(
        side = %schema.side,
        records = record_count,
        keys = rows.len(),
        "Parsed ledger export"
    );
    Ok(rows)
}

fn amount_at(
    record: &StringRecord,
    index: usize,
    column: &str,
    side: Side,
    line: u64,
) -> Result<Decimal> {
    let raw = record.get(index).unwrap_or("");
    parse_amount(raw).ok_or_else(|| Error::InvalidAmount {
        ledger: side.to_string(),
        line,
        column: column.to_string(),
        value: raw.to_string(),
    })
}

/// Parse a monetary cell; blank cells are zero
///
/// Accepts currency symbols, thousands separators and accounting-style
/// parentheses for negatives.
fn parse_amount(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    if cleaned.is_empty() {
        return Some(Decimal::ZERO);
    }

    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}
