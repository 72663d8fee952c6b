//! Hierarchical account trees rebuilt from flat, dot-coded account lines.
//!
//! Account lines arrive in no particular order and one statement period at a
//! time, so a child may be seen before its parent. [`AccountTreeBuilder`] keeps
//! such children aside until the parent shows up, and after the last line is
//! appended it links whatever is still pending and sorts every level by the
//! numeric value of the last code segment.
//!
//! Nodes live in an arena owned by [`AccountTree`]; [`NodeId`]s index into it.

use crate::balance_format::BalanceFormatter;
use crate::error::{ReportError, Result};
use crate::schema::{AccountRow, ColumnKey};
use log::{debug, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Index;

pub type NodeId = usize;

const ROOT: NodeId = 0;

/// Level of accounts that hang directly under the synthetic root.
pub const TOP_LEVEL: usize = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountNode {
    code: String,
    name: String,
    quantities: Vec<Option<f64>>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    #[serde(skip)]
    sequence: usize,
}

impl AccountNode {
    fn new(code: String, name: String, column_count: usize, sequence: usize) -> Self {
        Self {
            code,
            name,
            quantities: vec![None; column_count],
            parent: None,
            children: Vec::new(),
            sequence,
        }
    }

    fn root() -> Self {
        Self::new(String::new(), String::new(), 0, 0)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Last segment of the code: `"2.01.04"` -> `"04"`, `"3"` -> `"3"`.
    pub fn short_code(&self) -> &str {
        match self.code.rfind('.') {
            Some(index) => &self.code[index + 1..],
            None => &self.code,
        }
    }

    pub fn short_code_value(&self) -> Result<u64> {
        let segment = self.short_code();
        segment
            .parse::<u64>()
            .map_err(|_| ReportError::MalformedAccountCode {
                code: self.code.clone(),
                segment: segment.to_string(),
            })
    }

    /// Code of the parent account: `"2.01.04"` -> `"2.01"`, `"1"` -> `""`.
    pub fn parent_code(&self) -> &str {
        match self.code.rfind('.') {
            Some(index) => &self.code[..index],
            None => "",
        }
    }

    /// Number of segments in the code; the synthetic root is level 0.
    pub fn level(&self) -> usize {
        if self.code.is_empty() {
            0
        } else {
            self.code.matches('.').count() + 1
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantities(&self) -> &[Option<f64>] {
        &self.quantities
    }

    pub fn quantity(&self, column: usize) -> Option<f64> {
        self.quantities.get(column).copied().flatten()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none() && self.code.is_empty()
    }

    fn set_numeric_column_count(&mut self, count: usize) {
        self.quantities.resize(count, None);
    }

    fn append_quantity(&mut self, column: usize, quantity: f64) -> Result<()> {
        let count = self.quantities.len();
        let slot = self
            .quantities
            .get_mut(column)
            .ok_or(ReportError::ColumnOutOfRange { column, count })?;
        *slot = Some(quantity);
        Ok(())
    }

    fn sort_key(&self) -> (ShortCodeKey<'_>, usize) {
        let key = match self.short_code_value() {
            Ok(value) => ShortCodeKey::Numeric(value),
            Err(_) => ShortCodeKey::Text(self.short_code()),
        };
        (key, self.sequence)
    }
}

/// Numeric codes sort before malformed ones, which fall back to string order.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum ShortCodeKey<'a> {
    Numeric(u64),
    Text(&'a str),
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountTree {
    nodes: Vec<AccountNode>,
    column_keys: Vec<Option<ColumnKey>>,
    #[serde(skip)]
    by_code: HashMap<String, NodeId>,
}

impl Default for AccountTree {
    fn default() -> Self {
        AccountTreeBuilder::new().finish()
    }
}

impl Index<NodeId> for AccountTree {
    type Output = AccountNode;

    fn index(&self, id: NodeId) -> &AccountNode {
        &self.nodes[id]
    }
}

impl AccountTree {
    pub fn root_id(&self) -> NodeId {
        ROOT
    }

    pub fn root(&self) -> &AccountNode {
        &self.nodes[ROOT]
    }

    pub fn node(&self, id: NodeId) -> Option<&AccountNode> {
        self.nodes.get(id)
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &AccountNode> + '_ {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
            .iter()
            .map(move |&child| &self.nodes[child])
    }

    pub fn parent(&self, id: NodeId) -> Option<&AccountNode> {
        self.nodes
            .get(id)
            .and_then(|node| node.parent)
            .map(|parent| &self.nodes[parent])
    }

    /// Looks an account up by code; with duplicated codes the last one appended wins.
    pub fn find_id(&self, code: &str) -> Option<NodeId> {
        self.by_code.get(code).copied()
    }

    pub fn find(&self, code: &str) -> Option<&AccountNode> {
        self.find_id(code).map(|id| &self.nodes[id])
    }

    /// Number of accounts, not counting the synthetic root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_count(&self) -> usize {
        self.column_keys.len()
    }

    pub fn column_keys(&self) -> &[Option<ColumnKey>] {
        &self.column_keys
    }

    pub fn column_key(&self, column: usize) -> Result<Option<&ColumnKey>> {
        self.column_keys
            .get(column)
            .map(Option::as_ref)
            .ok_or(ReportError::ColumnOutOfRange {
                column,
                count: self.column_keys.len(),
            })
    }

    /// Node ids in depth-first pre-order, children in sorted order, root excluded.
    pub fn walk(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.len());
        let mut stack: Vec<NodeId> = self.nodes[ROOT].children.iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.iter().rev().copied());
        }

        order
    }

    /// Every known quantity in the tree, for set-based format policies.
    pub fn quantity_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.nodes[1..]
            .iter()
            .flat_map(|node| node.quantities.iter().flatten().copied())
    }

    pub fn to_markdown(&self, formatter: &BalanceFormatter, precision: usize) -> String {
        let mut output = String::new();

        output.push_str("| Code | Name |");
        for key in &self.column_keys {
            let header = key.as_ref().map(ToString::to_string).unwrap_or_default();
            output.push_str(&format!(" {} |", header));
        }
        output.push('\n');

        output.push_str("|---|---|");
        for _ in &self.column_keys {
            output.push_str("---:|");
        }
        output.push('\n');

        for id in self.walk() {
            let node = &self.nodes[id];
            let indent = "  ".repeat(node.level().saturating_sub(TOP_LEVEL));
            output.push_str(&format!("| {} | {}{} |", node.code, indent, node.name));
            for quantity in &node.quantities {
                let text = quantity
                    .map(|q| formatter.format(q, precision))
                    .unwrap_or_default();
                output.push_str(&format!(" {} |", text));
            }
            output.push('\n');
        }

        output
    }
}

/// Incrementally assembles an [`AccountTree`].
///
/// Columns are registered up front with [`set_numeric_column_count`] and
/// [`set_numeric_column_key`]; accounts are then appended in any order and
/// their quantities land in the slot of the matching column key. Accounts
/// missing from a period keep `None` in that slot.
///
/// [`set_numeric_column_count`]: AccountTreeBuilder::set_numeric_column_count
/// [`set_numeric_column_key`]: AccountTreeBuilder::set_numeric_column_key
#[derive(Debug)]
pub struct AccountTreeBuilder {
    nodes: Vec<AccountNode>,
    column_keys: Vec<Option<ColumnKey>>,
    by_code: HashMap<String, NodeId>,
    orphans: BTreeMap<String, Vec<NodeId>>,
}

impl Default for AccountTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountTreeBuilder {
    pub fn new() -> Self {
        Self {
            nodes: vec![AccountNode::root()],
            column_keys: Vec::new(),
            by_code: HashMap::new(),
            orphans: BTreeMap::new(),
        }
    }

    /// Builds a tree in one go, with one column per distinct key found in
    /// `rows`, in ascending key order.
    pub fn build(rows: impl IntoIterator<Item = AccountRow>) -> AccountTree {
        let rows: Vec<AccountRow> = rows.into_iter().collect();

        let keys: BTreeSet<&ColumnKey> = rows.iter().flat_map(|row| row.quantities.keys()).collect();

        let mut builder = Self::new();
        builder.set_numeric_column_count(keys.len());
        for (column, key) in keys.into_iter().enumerate() {
            builder.column_keys[column] = Some(key.clone());
        }

        for row in &rows {
            builder.append(&row.code, &row.name, &row.quantities);
        }

        debug!(
            "Built account tree with {} accounts over {} columns",
            rows.len(),
            builder.column_keys.len()
        );

        builder.finish()
    }

    pub fn set_numeric_column_count(&mut self, count: usize) {
        self.column_keys.resize(count, None);
        for node in &mut self.nodes[1..] {
            node.set_numeric_column_count(count);
        }
    }

    pub fn numeric_column_count(&self) -> usize {
        self.column_keys.len()
    }

    pub fn set_numeric_column_key(&mut self, column: usize, key: impl Into<ColumnKey>) -> Result<()> {
        let count = self.column_keys.len();
        let slot = self
            .column_keys
            .get_mut(column)
            .ok_or(ReportError::ColumnOutOfRange { column, count })?;
        *slot = Some(key.into());
        Ok(())
    }

    /// Adds an account and fills the slots of the registered columns found in
    /// `quantities`. Keys without a registered column are ignored.
    pub fn append(
        &mut self,
        code: &str,
        name: &str,
        quantities: &BTreeMap<ColumnKey, f64>,
    ) -> NodeId {
        let id = self.insert_node(code, name);

        for (key, quantity) in quantities {
            match self.column_of(key) {
                Some(column) => self.nodes[id].quantities[column] = Some(*quantity),
                None => debug!("Account {}: no column registered for {}", code, key),
            }
        }

        id
    }

    /// Sets the quantity of an already appended account in `column`.
    pub fn append_quantity(&mut self, code: &str, column: usize, quantity: f64) -> Result<()> {
        let id = *self
            .by_code
            .get(code)
            .ok_or_else(|| ReportError::UnknownAccount(code.to_string()))?;
        self.nodes[id].append_quantity(column, quantity)
    }

    /// Links pending children and sorts every level.
    pub fn finish(mut self) -> AccountTree {
        let orphans = std::mem::take(&mut self.orphans);

        for (parent_code, children) in orphans {
            let parent = match self.by_code.get(&parent_code) {
                Some(&parent) => parent,
                None => {
                    warn!(
                        "Parent account '{}' never appeared; attaching {} account(s) to the root",
                        parent_code,
                        children.len()
                    );
                    ROOT
                }
            };

            for child in children {
                self.attach(parent, child);
            }
        }

        for id in 0..self.nodes.len() {
            let mut children = std::mem::take(&mut self.nodes[id].children);
            children.sort_by(|a, b| self.nodes[*a].sort_key().cmp(&self.nodes[*b].sort_key()));
            self.nodes[id].children = children;
        }

        AccountTree {
            nodes: self.nodes,
            column_keys: self.column_keys,
            by_code: self.by_code,
        }
    }

    fn column_of(&self, key: &ColumnKey) -> Option<usize> {
        self.column_keys
            .iter()
            .position(|candidate| candidate.as_ref() == Some(key))
    }

    fn insert_node(&mut self, code: &str, name: &str) -> NodeId {
        let id = self.nodes.len();
        let node = AccountNode::new(code.to_string(), name.to_string(), self.column_keys.len(), id);

        if let Err(e) = node.short_code_value() {
            warn!("{}; ordering it after numeric siblings", e);
        }

        let level = node.level();
        let parent_code = node.parent_code().to_string();
        self.nodes.push(node);

        if level <= TOP_LEVEL {
            self.attach(ROOT, id);
        } else if let Some(&parent) = self.by_code.get(&parent_code) {
            self.attach(parent, id);
        } else {
            self.orphans.entry(parent_code).or_default().push(id);
        }

        if let Some(previous) = self.by_code.insert(code.to_string(), id) {
            debug!(
                "Duplicate account code '{}': node {} replaces node {} for lookups",
                code, id, previous
            );
        }

        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
    }
}
