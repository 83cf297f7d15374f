//! Outer-join comparison of two ledger exports
//!
//! Every key present in either export yields exactly one row. A side that
//! lacks the key contributes zero debit and zero credit. Rows come out in
//! ascending key order.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use crate::models::{LedgerRow, MatchStatus, Presence, ReconciledRow, ReconciledTable};

/// Smallest absolute difference that makes a row Mismatched
pub const MISMATCH_TOLERANCE: Decimal = Decimal::ONE;

/// Compare one key's accounting and ledger rows
///
/// At least one of `accounting` and `ledger` should be present; if both are
/// absent the row is all zeros and Matched.
pub fn classify(
    key: &str,
    accounting: Option<&LedgerRow>,
    ledger: Option<&LedgerRow>,
) -> ReconciledRow {
    let presence = match (accounting.is_some(), ledger.is_some()) {
        (true, false) => Presence::AccountingOnly,
        (false, true) => Presence::LedgerOnly,
        _ => Presence::Both,
    };

    let a = accounting.map(LedgerRow::amounts).unwrap_or_default();
    let b = ledger.map(LedgerRow::amounts).unwrap_or_default();

    let debit_diff = a.debit - b.debit;
    let credit_diff = a.credit - b.credit;

    let status = if debit_diff.abs() >= MISMATCH_TOLERANCE || credit_diff.abs() >= MISMATCH_TOLERANCE
    {
        MatchStatus::Mismatched
    } else {
        MatchStatus::Matched
    };

    ReconciledRow {
        key: key.to_string(),
        accounting: a,
        ledger: b,
        presence,
        debit_diff,
        credit_diff,
        status,
        explanation: None,
    }
}

/// Full outer join of the two exports on key
pub fn reconcile(accounting: &[LedgerRow], ledger: &[LedgerRow]) -> ReconciledTable {
    let mut joined: BTreeMap<&str, (Option<&LedgerRow>, Option<&LedgerRow>)> = BTreeMap::new();

    for row in accounting {
        joined.entry(row.key.as_str()).or_default().0 = Some(row);
    }
    for row in ledger {
        joined.entry(row.key.as_str()).or_default().1 = Some(row);
    }

    let rows: Vec<ReconciledRow> = joined
        .into_iter()
        .map(|(key, (a, b))| classify(key, a, b))
        .collect();

    let table = ReconciledTable::new(rows);
    debug!(
        rows = table.len(),
        mismatched = table.mismatched().count(),
        "Reconciled ledgers"
    );
    table
}
