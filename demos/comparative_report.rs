use chrono::NaiveDate;
use comparative_statements::{
    fields, AccountQuery, AccountRecord, BalanceType, DocumentType, FiledAccount, FiledRecord,
    FiledStatement, ImportEvent, ImportStage, InMemoryStore, ReportConfig, StatementReporter,
    StatementRow, StatementType, StoreSink,
};
use std::sync::{Arc, Mutex};

const ENTITY: u32 = 9512;

fn year_end(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 12, 31).unwrap()
}

fn filings() -> Vec<FiledRecord> {
    let mut records = Vec::new();

    let balance_sheet = [
        (2021, "1", "Total assets", 84_300_000.0),
        (2021, "1.01", "Current assets", 31_200_000.0),
        (2021, "1.01.01", "Cash and equivalents", 9_800_000.0),
        (2021, "1.02", "Non-current assets", 53_100_000.0),
        (2022, "1.02", "Non-current assets", 58_900_000.0),
        (2022, "1.01.01", "Cash and equivalents", 7_400_000.0),
        (2022, "1.01", "Current assets", 29_600_000.0),
        (2022, "1", "Total assets", 88_500_000.0),
    ];
    for (year, code, name, quantity) in balance_sheet {
        records.push(FiledRecord::Account(FiledAccount {
            entity_id: ENTITY,
            reference_date: year_end(year),
            document_type: DocumentType::Annual,
            statement_type: StatementType::BalanceSheetAssets,
            balance_type: BalanceType::Consolidated,
            record: AccountRecord {
                code: code.to_string(),
                name: name.to_string(),
                period_end_date: year_end(year),
                quantity,
            },
        }));
    }

    for (year, revenue, net_income) in [
        (2020, 41_000_000.0, 2_100_000.0),
        (2021, 47_500_000.0, 3_900_000.0),
        (2022, 52_800_000.0, 3_300_000.0),
    ] {
        records.push(FiledRecord::Statement(FiledStatement {
            entity_id: ENTITY,
            document_type: DocumentType::Annual,
            row: StatementRow::new(
                year_end(year),
                fields([("revenue", revenue), ("net_income", net_income)]),
            ),
        }));
    }

    records
}

fn main() {
    let shared = Arc::new(Mutex::new(InMemoryStore::new()));
    let source: Vec<comparative_statements::Result<FiledRecord>> =
        filings().into_iter().map(Ok).collect();

    let (stage, events) = ImportStage::new(source, StoreSink::new(shared.clone()));
    let handle = stage
        .with_progress_interval(4)
        .spawn()
        .expect("import thread should start");

    for event in events {
        match event {
            ImportEvent::Message(text) => println!("import: {}", text),
            ImportEvent::Finished { completed, records } => {
                println!("import finished (completed: {}, records: {})", completed, records)
            }
            ImportEvent::Failed(reason) => println!("import failed: {}", reason),
        }
    }
    handle
        .join()
        .expect("import thread should not panic")
        .expect("import should succeed");

    let store = shared.lock().expect("store lock").clone();

    let config = ReportConfig::from_json(
        r#"{
            "balance_format": "Best",
            "precision": 1,
            "horizontal_analysis": true,
            "reverse_columns": true
        }"#,
    )
    .expect("valid report configuration");
    let reporter = StatementReporter::new(store, config).expect("reporter");

    let tree = reporter
        .account_tree(&AccountQuery {
            entity_id: ENTITY,
            reference_dates: vec![year_end(2021), year_end(2022)],
            document_type: DocumentType::Annual,
            statement_type: StatementType::BalanceSheetAssets,
            balance_type: BalanceType::Consolidated,
        })
        .expect("account tree");

    println!("\nBalance sheet (assets)\n");
    println!("{}", reporter.tree_to_markdown(&tree));

    let table = reporter
        .statement_table(
            ENTITY,
            2020,
            2022,
            [("revenue", "Revenue"), ("net_income", "Net income")],
        )
        .expect("income statement table");

    println!("Income statement, latest year first\n");
    println!(
        "{}",
        reporter
            .table_to_markdown(&table)
            .expect("markdown rendering")
    );
}
