use crate::schema::{AccountRecord, AccountRow, ColumnKey};
use log::debug;
use std::collections::BTreeMap;

/// Folds per-period account lines into one row per account code, with
/// quantities keyed by period end date. Rows come back in first-seen order;
/// the later name wins when a code is renamed between periods.
pub fn group_account_records(records: impl IntoIterator<Item = AccountRecord>) -> Vec<AccountRow> {
    let mut rows: Vec<AccountRow> = Vec::new();
    let mut positions: BTreeMap<String, usize> = BTreeMap::new();

    for record in records {
        let key = ColumnKey::Date(record.period_end_date);

        match positions.get(&record.code) {
            Some(&position) => {
                let row = &mut rows[position];
                if row.name != record.name {
                    debug!(
                        "Account {} renamed from '{}' to '{}'",
                        record.code, row.name, record.name
                    );
                    row.name = record.name;
                }
                row.quantities.insert(key, record.quantity);
            }
            None => {
                positions.insert(record.code.clone(), rows.len());
                rows.push(AccountRow::new(record.code, record.name).with_quantity(key, record.quantity));
            }
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(code: &str, name: &str, year: i32, quantity: f64) -> AccountRecord {
        AccountRecord {
            code: code.to_string(),
            name: name.to_string(),
            period_end_date: NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
            quantity,
        }
    }

    #[test]
    fn test_group_by_code() {
        let rows = group_account_records(vec![
            record("1", "Assets", 2020, 100.0),
            record("1.01", "Current", 2020, 40.0),
            record("1", "Assets", 2021, 120.0),
        ]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].code, "1");
        assert_eq!(rows[0].quantities.len(), 2);
        assert_eq!(
            rows[0].quantities.get(&ColumnKey::Date(NaiveDate::from_ymd_opt(2021, 12, 31).unwrap())),
            Some(&120.0)
        );
        assert_eq!(rows[1].quantities.len(), 1);
    }

    #[test]
    fn test_later_name_wins() {
        let rows = group_account_records(vec![
            record("3.01", "Revenue", 2020, 10.0),
            record("3.01", "Net revenue", 2021, 12.0),
        ]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Net revenue");
    }
}
