//! Export of the reconciled table
//!
//! Supports:
//! - `.xlsx` workbook (the delivered artifact, also attached to the report email)
//! - CSV text (fed to the assistant, optionally written alongside the workbook)
//!
//! Both carry the same columns in the same order.

use std::fs;
use std::path::Path;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{ReconciledRow, ReconciledTable};

/// Default file name of the workbook (also the email attachment name)
pub const EXPORT_FILENAME: &str = "reconciliation_output.xlsx";

/// Name of the single worksheet
const SHEET_NAME: &str = "Reconciliation";

/// Column headers, in output order
pub const EXPORT_COLUMNS: [&str; 10] = [
    "key",
    "debit_accounting",
    "credit_accounting",
    "debit_ledger",
    "credit_ledger",
    "debit_diff",
    "credit_diff",
    "status",
    "presence",
    "ai_explanation",
];

/// One reconciled row flattened for export
#[derive(Debug, Clone, Serialize)]
pub struct ExportRow<'a> {
    pub key: &'a str,
    pub debit_accounting: Decimal,
    pub credit_accounting: Decimal,
    pub debit_ledger: Decimal,
    pub credit_ledger: Decimal,
    pub debit_diff: Decimal,
    pub credit_diff: Decimal,
    pub status: &'static str,
    pub presence: &'static str,
    pub ai_explanation: &'a str,
}

impl<'a> From<&'a ReconciledRow> for ExportRow<'a> {
    fn from(row: &'a ReconciledRow) -> Self {
        Self {
            key: &row.key,
            debit_accounting: row.accounting.debit,
            credit_accounting: row.accounting.credit,
            debit_ledger: row.ledger.debit,
            credit_ledger: row.ledger.credit,
            debit_diff: row.debit_diff,
            credit_diff: row.credit_diff,
            status: row.status.as_str(),
            presence: row.presence.as_str(),
            ai_explanation: row.explanation_text(),
        }
    }
}

impl ExportRow<'_> {
    fn amounts(&self) -> [Decimal; 6] {
        [
            self.debit_accounting,
            self.credit_accounting,
            self.debit_ledger,
            self.credit_ledger,
            self.debit_diff,
            self.credit_diff,
        ]
    }
}

/// Serialize the table as CSV text with a header row
pub fn to_csv(table: &ReconciledTable) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(EXPORT_COLUMNS)?;
    for row in table {
        writer.serialize(ExportRow::from(row))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::InvalidData(format!("Failed to flush CSV export: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::InvalidData(format!("CSV export is not UTF-8: {}", e)))
}

/// Build the workbook in memory
pub fn to_xlsx(table: &ReconciledTable) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let worksheet = workbook.add_worksheet().set_name(SHEET_NAME)?;

    for (col, name) in EXPORT_COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &header_format)?;
    }

    for (idx, row) in table.iter().enumerate() {
        let r = (idx + 1) as u32;
        let export = ExportRow::from(row);

        worksheet.write_string(r, 0, export.key)?;
        for (offset, amount) in export.amounts().iter().enumerate() {
            // Cells are f64; the table itself stays decimal.
            let value = amount.to_f64().unwrap_or_default();
            worksheet.write_number(r, (offset + 1) as u16, value)?;
        }
        worksheet.write_string(r, 7, export.status)?;
        worksheet.write_string(r, 8, export.presence)?;
        worksheet.write_string(r, 9, export.ai_explanation)?;
    }

    worksheet.set_freeze_panes(1, 0)?;
    worksheet.set_column_width(0, 14)?;
    worksheet.set_column_width(9, 60)?;

    let bytes = workbook.save_to_buffer()?;
    debug!(rows = table.len(), bytes = bytes.len(), "Built workbook");
    Ok(bytes)
}

/// Write the workbook to `path`
pub fn write_xlsx(table: &ReconciledTable, path: &Path) -> Result<()> {
    let bytes = to_xlsx(table)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Write the CSV export to `path`
pub fn write_csv(table: &ReconciledTable, path: &Path) -> Result<()> {
    fs::write(path, to_csv(table)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LedgerRow;
    use crate::reconcile::reconcile;

    fn table() -> ReconciledTable {
        let accounting = vec![
            LedgerRow::new("1000", Decimal::from(500), Decimal::ZERO),
            LedgerRow::new("2000", Decimal::from(100), Decimal::ZERO),
        ];
        let ledger = vec![
            LedgerRow::new("1000", Decimal::from(500), Decimal::ZERO),
            LedgerRow::new("2000", Decimal::from(80), Decimal::ZERO),
            LedgerRow::new("4000", Decimal::ZERO, Decimal::from(7)),
        ];
        let mut table = reconcile(&accounting, &ledger);
        table.set_explanation(1, "Missing invoice, \"INV-7\"".to_string());
        table
    }

    #[test]
    fn test_csv_header_and_rows() {
        let csv = to_csv(&table()).unwrap();
        let mut lines = csv.lines();

        assert_eq!(
            lines.next().unwrap(),
            "key,debit_accounting,credit_accounting,debit_ledger,credit_ledger,\
             debit_diff,credit_diff,status,presence,ai_explanation"
        );
        assert_eq!(lines.next().unwrap(), "1000,500,0,500,0,0,0,Matched,both,");
        let mismatch = lines.next().unwrap();
        assert!(mismatch.starts_with("2000,100,0,80,0,20,0,Mismatched,both,"));
        assert!(mismatch.contains("\"Missing invoice, \"\"INV-7\"\"\""));
        assert_eq!(
            lines.next().unwrap(),
            "4000,0,0,0,7,0,-7,Mismatched,ledger_only,"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_csv_parses_back_with_same_row_count() {
        let table = table();
        let csv = to_csv(&table).unwrap();
        let mut rdr = csv::Reader::from_reader(csv.as_bytes());
        assert_eq!(rdr.headers().unwrap().len(), EXPORT_COLUMNS.len());
        assert_eq!(rdr.records().count(), table.len());
    }

    #[test]
    fn test_empty_table_csv_has_header_only() {
        let csv = to_csv(&ReconciledTable::default()).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_xlsx_is_zip_container() {
        let bytes = to_xlsx(&table()).unwrap();
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let xlsx = dir.path().join(EXPORT_FILENAME);
        let csv = dir.path().join("out.csv");

        write_xlsx(&table(), &xlsx).unwrap();
        write_csv(&table(), &csv).unwrap();

        assert!(fs::metadata(&xlsx).unwrap().len() > 0);
        assert_eq!(fs::read_to_string(&csv).unwrap().lines().count(), 4);
    }
}
