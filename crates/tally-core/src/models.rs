//! Domain models for Tally

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Which of the two exports a row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Accounting-system export (keyed by account code)
    Accounting,
    /// Internal ledger export (keyed by GL code)
    Ledger,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accounting => "accounting",
            Self::Ledger => "ledger",
        }
    }

    /// Key column used when none is given explicitly
    pub fn default_key_column(&self) -> &'static str {
        match self {
            Self::Accounting => "account_code",
            Self::Ledger => "gl_code",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A debit/credit pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amounts {
    pub debit: Decimal,
    pub credit: Decimal,
}

impl Amounts {
    pub fn new(debit: Decimal, credit: Decimal) -> Self {
        Self { debit, credit }
    }
}

/// One normalized row of a ledger export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    /// Trimmed value of the key column
    pub key: String,
    pub debit: Decimal,
    pub credit: Decimal,
}

impl LedgerRow {
    pub fn new(key: impl Into<String>, debit: Decimal, credit: Decimal) -> Self {
        Self {
            key: key.into(),
            debit,
            credit,
        }
    }

    pub fn amounts(&self) -> Amounts {
        Amounts::new(self.debit, self.credit)
    }
}

/// Which exports contained a reconciled key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Both,
    AccountingOnly,
    LedgerOnly,
}

impl Presence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Both => "both",
            Self::AccountingOnly => "accounting_only",
            Self::LedgerOnly => "ledger_only",
        }
    }
}

impl std::fmt::Display for Presence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of comparing one key across both exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Matched,
    Mismatched,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "Matched",
            Self::Mismatched => "Mismatched",
        }
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A key's accounting and ledger amounts side by side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledRow {
    pub key: String,
    /// Accounting amounts (zero when the key is ledger-only)
    pub accounting: Amounts,
    /// Ledger amounts (zero when the key is accounting-only)
    pub ledger: Amounts,
    pub presence: Presence,
    /// `accounting.debit - ledger.debit`
    pub debit_diff: Decimal,
    /// `accounting.credit - ledger.credit`
    pub credit_diff: Decimal,
    pub status: MatchStatus,
    /// None until the explainer has visited the row
    pub explanation: Option<String>,
}

impl ReconciledRow {
    pub fn is_mismatched(&self) -> bool {
        self.status == MatchStatus::Mismatched
    }

    /// `|debit_diff| + |credit_diff|`
    pub fn absolute_difference(&self) -> Decimal {
        self.debit_diff.abs() + self.credit_diff.abs()
    }

    pub fn explanation_text(&self) -> &str {
        self.explanation.as_deref().unwrap_or("")
    }
}

/// Result of a reconciliation run
///
/// Rows are fixed once produced; only explanations may be filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciledTable {
    rows: Vec<ReconciledRow>,
}

impl ReconciledTable {
    pub fn new(rows: Vec<ReconciledRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ReconciledRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReconciledRow> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ReconciledRow> {
        self.rows.iter().find(|r| r.key == key)
    }

    pub fn mismatched(&self) -> impl Iterator<Item = &ReconciledRow> {
        self.rows.iter().filter(|r| r.is_mismatched())
    }

    /// Set the explanation of the row at `index`
    ///
    /// Returns false if the index is out of range.
    pub fn set_explanation(&mut self, index: usize, explanation: String) -> bool {
        match self.rows.get_mut(index) {
            Some(row) => {
                row.explanation = Some(explanation);
                true
            }
            None => false,
        }
    }

    pub fn summary(&self) -> ReconciliationSummary {
        ReconciliationSummary::from_table(self)
    }
}

impl<'a> IntoIterator for &'a ReconciledTable {
    type Item = &'a ReconciledRow;
    type IntoIter = std::slice::Iter<'a, ReconciledRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Aggregate figures over a reconciled table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationSummary {
    pub total_rows: usize,
    pub matched: usize,
    pub mismatched: usize,
    pub accounting_only: usize,
    pub ledger_only: usize,
    /// Sum of `|debit_diff| + |credit_diff|` over every row
    pub total_difference: Decimal,
}

impl ReconciliationSummary {
    pub fn from_table(table: &ReconciledTable) -> Self {
        let mut summary = Self {
            total_rows: table.len(),
            ..Self::default()
        };

        for row in table {
            match row.status {
                MatchStatus::Matched => summary.matched += 1,
                MatchStatus::Mismatched => summary.mismatched += 1,
            }
            match row.presence {
                Presence::AccountingOnly => summary.accounting_only += 1,
                Presence::LedgerOnly => summary.ledger_only += 1,
                Presence::Both => {}
            }
            summary.total_difference += row.absolute_difference();
        }

        summary
    }

    /// One-sentence summary sent over the messaging relay
    pub fn message(&self) -> String {
        format!(
            "Reconciliation done. {} mismatches found. Total difference: {:.2}.",
            self.mismatched,
            round_money(self.total_difference)
        )
    }
}

/// Round to cents for display, halves away from zero
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// One question put to the assistant and its answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatEntry {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

/// Append-only Q/A history for one interactive session
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    entries: Vec<ChatEntry>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return a reference to it
    pub fn push(&mut self, question: String, answer: String) -> &ChatEntry {
        self.entries.push(ChatEntry {
            question,
            answer,
            asked_at: Utc::now(),
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the history as markdown Q/A blocks
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&format!("**Q:** {}\n", entry.question));
            out.push_str(&format!("**A:** {}\n", entry.answer));
            out.push_str("---\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn row(key: &str, debit_diff: i64, credit_diff: i64, status: MatchStatus) -> ReconciledRow {
        ReconciledRow {
            key: key.to_string(),
            accounting: Amounts::default(),
            ledger: Amounts::default(),
            presence: Presence::Both,
            debit_diff: Decimal::from(debit_diff),
            credit_diff: Decimal::from(credit_diff),
            status,
            explanation: None,
        }
    }

    #[test]
    fn test_summary_message_exact_text() {
        let table = ReconciledTable::new(vec![
            ReconciledRow {
                debit_diff: Decimal::new(205, 1),
                ..row("2000", 0, 0, MatchStatus::Mismatched)
            },
            row("3000", 0, -25, MatchStatus::Mismatched),
            row("1000", 0, 0, MatchStatus::Matched),
        ]);

        let summary = table.summary();
        assert_eq!(summary.mismatched, 2);
        assert_eq!(summary.total_difference, Decimal::new(455, 1));
        assert_eq!(
            summary.message(),
            "Reconciliation done. 2 mismatches found. Total difference: 45.50."
        );
    }

    #[test]
    fn test_summary_counts_presence() {
        let mut only_a = row("A", 5, 0, MatchStatus::Mismatched);
        only_a.presence = Presence::AccountingOnly;
        let mut only_b = row("B", 0, -3, MatchStatus::Mismatched);
        only_b.presence = Presence::LedgerOnly;
        let table = ReconciledTable::new(vec![only_a, only_b, row("C", 0, 0, MatchStatus::Matched)]);

        let summary = table.summary();
        assert_eq!(summary.total_rows, 3);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.accounting_only, 1);
        assert_eq!(summary.ledger_only, 1);
        assert_eq!(summary.total_difference, Decimal::from(8));
    }

    #[test]
    fn test_summary_rounds_halves_up() {
        let table = ReconciledTable::new(vec![ReconciledRow {
            credit_diff: Decimal::new(1125, 3),
            ..row("4000", 0, 0, MatchStatus::Mismatched)
        }]);
        assert!(table.summary().message().ends_with("Total difference: 1.13."));

        assert_eq!(round_money(Decimal::new(125, 3)), Decimal::new(13, 2));
        assert_eq!(round_money(Decimal::new(2675, 3)), Decimal::new(268, 2));
        assert_eq!(round_money(Decimal::new(-125, 3)), Decimal::new(-13, 2));
    }

    #[test]
    fn test_empty_summary_message() {
        let summary = ReconciledTable::default().summary();
        assert_eq!(
            summary.message(),
            "Reconciliation done. 0 mismatches found. Total difference: 0.00."
        );
    }

    #[test]
    fn test_set_explanation_out_of_range() {
        let mut table = ReconciledTable::new(vec![row("1", 0, 0, MatchStatus::Matched)]);
        assert!(table.set_explanation(0, String::new()));
        assert!(!table.set_explanation(5, "nope".into()));
        assert_eq!(table.rows()[0].explanation.as_deref(), Some(""));
    }

    #[test]
    fn test_chat_log_is_append_only() {
        let mut log = ChatLog::new();
        log.push("Which rows differ?".into(), "2000 and 3000".into());
        let entry = log.push("Total?".into(), "45.50".into());
        assert_eq!(entry.question, "Total?");
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].answer, "2000 and 3000");

        let rendered = log.render_markdown();
        assert!(rendered.starts_with("**Q:** Which rows differ?\n**A:** 2000 and 3000\n---\n"));
    }
}
