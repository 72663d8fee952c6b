use crate::error::Result;
use crate::schema::{
    AccountRecord, BalanceType, DateRange, DocumentType, IndicatorInput, StatementRow,
    StatementType,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier of a filing company.
pub type EntityId = u32;

/// Source of filed statement data. Callers inject an implementation into the
/// builders; nothing in this crate holds a global connection.
pub trait StatementStore {
    /// Account lines of one filing.
    fn fetch_accounts(
        &self,
        entity_id: EntityId,
        reference_date: NaiveDate,
        document_type: DocumentType,
        statement_type: StatementType,
        balance_type: BalanceType,
    ) -> Result<Vec<AccountRecord>>;

    /// Named-field statement records whose reference date falls in `date_range`.
    fn fetch_statement_rows(
        &self,
        entity_id: EntityId,
        date_range: DateRange,
        document_type: DocumentType,
    ) -> Result<Vec<StatementRow>>;

    fn fetch_indicator_inputs(
        &self,
        entity_id: EntityId,
        document_type: DocumentType,
    ) -> Result<Vec<IndicatorInput>>;
}

impl<S: StatementStore + ?Sized> StatementStore for &S {
    fn fetch_accounts(
        &self,
        entity_id: EntityId,
        reference_date: NaiveDate,
        document_type: DocumentType,
        statement_type: StatementType,
        balance_type: BalanceType,
    ) -> Result<Vec<AccountRecord>> {
        (**self).fetch_accounts(
            entity_id,
            reference_date,
            document_type,
            statement_type,
            balance_type,
        )
    }

    fn fetch_statement_rows(
        &self,
        entity_id: EntityId,
        date_range: DateRange,
        document_type: DocumentType,
    ) -> Result<Vec<StatementRow>> {
        (**self).fetch_statement_rows(entity_id, date_range, document_type)
    }

    fn fetch_indicator_inputs(
        &self,
        entity_id: EntityId,
        document_type: DocumentType,
    ) -> Result<Vec<IndicatorInput>> {
        (**self).fetch_indicator_inputs(entity_id, document_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiledAccount {
    pub entity_id: EntityId,
    pub reference_date: NaiveDate,
    pub document_type: DocumentType,
    pub statement_type: StatementType,
    pub balance_type: BalanceType,
    pub record: AccountRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiledStatement {
    pub entity_id: EntityId,
    pub document_type: DocumentType,
    pub row: StatementRow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiledIndicatorInput {
    pub entity_id: EntityId,
    pub document_type: DocumentType,
    pub input: IndicatorInput,
}

/// Any record an [`InMemoryStore`] can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FiledRecord {
    Account(FiledAccount),
    Statement(FiledStatement),
    IndicatorInput(FiledIndicatorInput),
}

/// Store backed by plain vectors. Results come back ordered by reference date.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryStore {
    #[serde(default)]
    pub accounts: Vec<FiledAccount>,
    #[serde(default)]
    pub statements: Vec<FiledStatement>,
    #[serde(default)]
    pub indicator_inputs: Vec<FiledIndicatorInput>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn insert(&mut self, record: FiledRecord) {
        match record {
            FiledRecord::Account(account) => self.accounts.push(account),
            FiledRecord::Statement(statement) => self.statements.push(statement),
            FiledRecord::IndicatorInput(input) => self.indicator_inputs.push(input),
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len() + self.statements.len() + self.indicator_inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert_account(
        &mut self,
        entity_id: EntityId,
        reference_date: NaiveDate,
        document_type: DocumentType,
        statement_type: StatementType,
        balance_type: BalanceType,
        record: AccountRecord,
    ) {
        self.accounts.push(FiledAccount {
            entity_id,
            reference_date,
            document_type,
            statement_type,
            balance_type,
            record,
        });
    }

    pub fn insert_statement_row(
        &mut self,
        entity_id: EntityId,
        document_type: DocumentType,
        row: StatementRow,
    ) {
        self.statements.push(FiledStatement {
            entity_id,
            document_type,
            row,
        });
    }

    pub fn insert_indicator_input(
        &mut self,
        entity_id: EntityId,
        document_type: DocumentType,
        input: IndicatorInput,
    ) {
        self.indicator_inputs.push(FiledIndicatorInput {
            entity_id,
            document_type,
            input,
        });
    }
}

impl StatementStore for InMemoryStore {
    fn fetch_accounts(
        &self,
        entity_id: EntityId,
        reference_date: NaiveDate,
        document_type: DocumentType,
        statement_type: StatementType,
        balance_type: BalanceType,
    ) -> Result<Vec<AccountRecord>> {
        Ok(self
            .accounts
            .iter()
            .filter(|filed| {
                filed.entity_id == entity_id
                    && filed.reference_date == reference_date
                    && filed.document_type == document_type
                    && filed.statement_type == statement_type
                    && filed.balance_type == balance_type
            })
            .map(|filed| filed.record.clone())
            .collect())
    }

    /// Rows without a reference date cannot be range-checked and are passed
    /// through for the caller to discard.
    fn fetch_statement_rows(
        &self,
        entity_id: EntityId,
        date_range: DateRange,
        document_type: DocumentType,
    ) -> Result<Vec<StatementRow>> {
        let mut rows: Vec<StatementRow> = self
            .statements
            .iter()
            .filter(|filed| filed.entity_id == entity_id && filed.document_type == document_type)
            .filter(|filed| {
                filed
                    .row
                    .reference_date
                    .map_or(true, |date| date_range.contains(date))
            })
            .map(|filed| filed.row.clone())
            .collect();

        rows.sort_by_key(|row| row.reference_date);
        Ok(rows)
    }

    fn fetch_indicator_inputs(
        &self,
        entity_id: EntityId,
        document_type: DocumentType,
    ) -> Result<Vec<IndicatorInput>> {
        let mut inputs: Vec<IndicatorInput> = self
            .indicator_inputs
            .iter()
            .filter(|filed| filed.entity_id == entity_id && filed.document_type == document_type)
            .map(|filed| filed.input.clone())
            .collect();

        inputs.sort_by_key(|input| input.reference_date);
        Ok(inputs)
    }
}
