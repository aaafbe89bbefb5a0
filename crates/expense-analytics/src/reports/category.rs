use super::{ensure_groupable, format_amount, ReportError};
use crate::table::{Column, ExpenseTable, GroupValue, PolicyId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use tracing::debug;

pub const TOTAL_COST_HEADER: &str = "Gesamtkosten";
pub const SUBSCRIBER_COUNT_HEADER: &str = "Anzahl_Versicherte";
pub const SUBSCRIBER_AVERAGE_HEADER: &str = "Durchschnittliche_Kosten_pro_Versicherten";

/// Which code column a cost report counts items in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Drug,
    Procedure,
    Diagnosis,
}

impl CategoryKind {
    pub const fn ordered() -> [Self; 3] {
        [Self::Drug, Self::Procedure, Self::Diagnosis]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Drug => "Medikament",
            Self::Procedure => "Eingriff",
            Self::Diagnosis => "Diagnose",
        }
    }

    pub fn counted_column(self) -> Column {
        match self {
            Self::Drug => Column::DRUG,
            Self::Procedure => Column::PROCEDURE,
            Self::Diagnosis => Column::DIAGNOSIS,
        }
    }

    pub const fn count_header(self) -> &'static str {
        match self {
            Self::Drug => "Anzahl_Verschreibungen",
            Self::Procedure => "Anzahl_Eingriffe",
            Self::Diagnosis => "Anzahl_Diagnosen",
        }
    }

    pub const fn item_average_header(self) -> &'static str {
        match self {
            Self::Drug => "Durchschnittliche_Kosten_pro_Verschreibung",
            Self::Procedure => "Durchschnittliche_Kosten_pro_Eingriff",
            Self::Diagnosis => "Durchschnittliche_Kosten_pro_Diagnose",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    pub const fn from_ascending(ascending: bool) -> Self {
        if ascending {
            Self::Ascending
        } else {
            Self::Descending
        }
    }
}

/// Cost figures for one grouping key tuple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAggregate {
    pub key: Vec<GroupValue>,
    pub total_cost: f64,
    pub item_count: usize,
    pub subscriber_count: usize,
    /// `None` when no row of the group carries the counted code.
    pub average_cost_per_item: Option<f64>,
    pub average_cost_per_subscriber: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryReport {
    pub kind: CategoryKind,
    pub group_by: Vec<String>,
    pub order: SortOrder,
    pub rows: Vec<CategoryAggregate>,
}

impl CategoryReport {
    pub fn headers(&self) -> Vec<String> {
        let mut headers = self.group_by.clone();
        headers.extend(
            [
                TOTAL_COST_HEADER,
                self.kind.count_header(),
                SUBSCRIBER_COUNT_HEADER,
                self.kind.item_average_header(),
                SUBSCRIBER_AVERAGE_HEADER,
            ]
            .map(String::from),
        );
        headers
    }

    pub fn truncate(&mut self, limit: usize) {
        self.rows.truncate(limit);
    }

    /// Rows keyed by the report's column headers, ready for JSON output.
    pub fn records(&self) -> Vec<Map<String, Value>> {
        let headers = self.headers();
        self.rows
            .iter()
            .map(|row| {
                let values = row
                    .key
                    .iter()
                    .map(|value| match value {
                        GroupValue::Integer(number) => Value::from(*number),
                        GroupValue::Text(text) => Value::from(text.clone()),
                    })
                    .chain([
                        Value::from(row.total_cost),
                        Value::from(row.item_count),
                        Value::from(row.subscriber_count),
                        optional_number(row.average_cost_per_item),
                        optional_number(row.average_cost_per_subscriber),
                    ]);
                let record: Map<String, Value> = headers.iter().cloned().zip(values).collect();
                record
            })
            .collect()
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(self.headers())?;

        for row in &self.rows {
            let mut fields: Vec<String> = row.key.iter().map(ToString::to_string).collect();
            fields.push(format_amount(row.total_cost));
            fields.push(row.item_count.to_string());
            fields.push(row.subscriber_count.to_string());
            fields.push(row.average_cost_per_item.map(format_amount).unwrap_or_default());
            fields.push(
                row.average_cost_per_subscriber
                    .map(format_amount)
                    .unwrap_or_default(),
            );
            csv_writer.write_record(&fields)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

fn optional_number(value: Option<f64>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

/// Costs per drug: items are non-null `Drug` entries (prescriptions).
pub fn cost_per_drug(
    table: &ExpenseTable,
    group_by: &[Column],
    order: SortOrder,
) -> Result<CategoryReport, ReportError> {
    aggregate_costs(table, CategoryKind::Drug, group_by, order)
}

/// Costs per procedure: items are non-null `Procedure` entries.
pub fn cost_per_procedure(
    table: &ExpenseTable,
    group_by: &[Column],
    order: SortOrder,
) -> Result<CategoryReport, ReportError> {
    aggregate_costs(table, CategoryKind::Procedure, group_by, order)
}

/// Costs per diagnosis: items are non-null `Diagnosis` entries.
pub fn cost_per_diagnosis(
    table: &ExpenseTable,
    group_by: &[Column],
    order: SortOrder,
) -> Result<CategoryReport, ReportError> {
    aggregate_costs(table, CategoryKind::Diagnosis, group_by, order)
}

#[derive(Default)]
struct Accumulator<'a> {
    total_cost: f64,
    item_count: usize,
    subscribers: HashSet<&'a PolicyId>,
}

/// Drops rows with a null in any grouping column, groups the rest by the key
/// tuple and sorts the groups by total cost. Ties keep ascending key order.
pub fn aggregate_costs(
    table: &ExpenseTable,
    kind: CategoryKind,
    group_by: &[Column],
    order: SortOrder,
) -> Result<CategoryReport, ReportError> {
    if group_by.is_empty() {
        return Err(ReportError::NoGroupingColumns);
    }
    for column in group_by {
        ensure_groupable(table, column)?;
    }

    let counted = kind.counted_column();
    let mut groups: BTreeMap<Vec<GroupValue>, Accumulator<'_>> = BTreeMap::new();
    let mut dropped = 0usize;

    for record in table.records() {
        let key: Option<Vec<GroupValue>> = group_by
            .iter()
            .map(|column| record.group_value(column))
            .collect();
        let Some(key) = key else {
            dropped += 1;
            continue;
        };

        let group = groups.entry(key).or_default();
        group.total_cost += record.amount;
        if record.has_value(&counted) {
            group.item_count += 1;
        }
        group.subscribers.insert(&record.policy_id);
    }

    let mut rows: Vec<CategoryAggregate> = groups
        .into_iter()
        .map(|(key, group)| CategoryAggregate {
            key,
            total_cost: group.total_cost,
            item_count: group.item_count,
            subscriber_count: group.subscribers.len(),
            average_cost_per_item: average(group.total_cost, group.item_count),
            average_cost_per_subscriber: average(group.total_cost, group.subscribers.len()),
        })
        .collect();

    match order {
        SortOrder::Ascending => rows.sort_by(|a, b| a.total_cost.total_cmp(&b.total_cost)),
        SortOrder::Descending => rows.sort_by(|a, b| b.total_cost.total_cmp(&a.total_cost)),
    }

    debug!(
        kind = kind.label(),
        groups = rows.len(),
        dropped,
        "aggregated category costs"
    );

    Ok(CategoryReport {
        kind,
        group_by: group_by.iter().map(|column| column.name().to_string()).collect(),
        order,
        rows,
    })
}

fn average(total: f64, count: usize) -> Option<f64> {
    (count > 0).then(|| total / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ExpenseRecord;

    fn sample_table() -> ExpenseTable {
        ExpenseTable::from_records(vec![
            ExpenseRecord::new("1", 2020, 100.0, 1950).with_drug("A"),
            ExpenseRecord::new("1", 2020, 50.0, 1950).with_drug("A"),
            ExpenseRecord::new("2", 2020, 30.0, 1962).with_drug("A"),
        ])
    }

    #[test]
    fn drug_costs_match_worked_example() {
        let report = cost_per_drug(&sample_table(), &[Column::DRUG], SortOrder::Descending)
            .expect("report builds");

        assert_eq!(report.rows.len(), 1);
        let row = &report.rows[0];
        assert_eq!(row.key, vec![GroupValue::Text("A".into())]);
        assert_eq!(row.total_cost, 180.0);
        assert_eq!(row.item_count, 3);
        assert_eq!(row.subscriber_count, 2);
        assert_eq!(row.average_cost_per_item, Some(60.0));
        assert_eq!(row.average_cost_per_subscriber, Some(90.0));
    }

    #[test]
    fn rows_with_null_keys_are_dropped() {
        let table = ExpenseTable::from_records(vec![
            ExpenseRecord::new("1", 2020, 10.0, 1950).with_procedure("5-010"),
            ExpenseRecord::new("1", 2020, 99.0, 1950),
            ExpenseRecord::new("2", 2021, 20.0, 1960).with_procedure("5-010"),
        ]);

        let report = cost_per_procedure(
            &table,
            &[Column::YEAR, Column::PROCEDURE],
            SortOrder::Ascending,
        )
        .expect("report builds");

        let totals: Vec<f64> = report.rows.iter().map(|row| row.total_cost).collect();
        assert_eq!(totals, vec![10.0, 20.0]);
        assert_eq!(
            report.rows[0].key,
            vec![GroupValue::Integer(2020), GroupValue::Text("5-010".into())]
        );
    }

    #[test]
    fn item_count_ignores_null_codes_outside_the_key() {
        let table = ExpenseTable::from_records(vec![
            ExpenseRecord::new("1", 2020, 10.0, 1950).with_diagnosis("I10"),
            ExpenseRecord::new("1", 2020, 30.0, 1950),
            ExpenseRecord::new("2", 2021, 5.0, 1960),
        ]);

        let report = cost_per_diagnosis(&table, &[Column::YEAR], SortOrder::Descending)
            .expect("report builds");

        assert_eq!(report.rows[0].key, vec![GroupValue::Integer(2020)]);
        assert_eq!(report.rows[0].total_cost, 40.0);
        assert_eq!(report.rows[0].item_count, 1);
        assert_eq!(report.rows[0].average_cost_per_item, Some(40.0));

        assert_eq!(report.rows[1].item_count, 0);
        assert_eq!(report.rows[1].average_cost_per_item, None);
        assert_eq!(report.rows[1].average_cost_per_subscriber, Some(5.0));
    }

    #[test]
    fn sort_order_follows_flag() {
        let table = ExpenseTable::from_records(vec![
            ExpenseRecord::new("1", 2020, 10.0, 1950).with_drug("A"),
            ExpenseRecord::new("1", 2020, 30.0, 1950).with_drug("B"),
            ExpenseRecord::new("1", 2020, 20.0, 1950).with_drug("C"),
        ]);

        let ascending = cost_per_drug(&table, &[Column::DRUG], SortOrder::from_ascending(true))
            .expect("report builds");
        let descending = cost_per_drug(&table, &[Column::DRUG], SortOrder::from_ascending(false))
            .expect("report builds");

        let labels = |report: &CategoryReport| -> Vec<String> {
            report.rows.iter().map(|row| row.key[0].to_string()).collect()
        };
        assert_eq!(labels(&ascending), vec!["A", "C", "B"]);
        assert_eq!(labels(&descending), vec!["B", "C", "A"]);
    }

    #[test]
    fn grouping_errors_are_reported() {
        let table = sample_table();

        assert!(matches!(
            cost_per_drug(&table, &[], SortOrder::Descending),
            Err(ReportError::NoGroupingColumns)
        ));
        assert!(matches!(
            cost_per_drug(&table, &[Column::parse("Kasse")], SortOrder::Descending),
            Err(ReportError::UnknownColumn(name)) if name == "Kasse"
        ));
        assert!(matches!(
            cost_per_drug(&table, &[Column::AMOUNT], SortOrder::Descending),
            Err(ReportError::NonCategoricalColumn(_))
        ));
    }

    #[test]
    fn exports_use_report_headers() {
        let report = cost_per_drug(&sample_table(), &[Column::DRUG], SortOrder::Descending)
            .expect("report builds");

        let mut buffer = Vec::new();
        report.write_csv(&mut buffer).expect("csv export succeeds");
        let text = String::from_utf8(buffer).expect("utf-8 output");
        assert_eq!(
            text,
            "Drug,Gesamtkosten,Anzahl_Verschreibungen,Anzahl_Versicherte,\
             Durchschnittliche_Kosten_pro_Verschreibung,Durchschnittliche_Kosten_pro_Versicherten\n\
             A,180,3,2,60,90\n"
        );

        let records = report.records();
        assert_eq!(records[0]["Gesamtkosten"], Value::from(180.0));
        assert_eq!(records[0]["Anzahl_Versicherte"], Value::from(2usize));
        assert_eq!(records[0]["Drug"], Value::from("A"));
    }

    #[test]
    fn group_headers_keep_the_requested_spelling() {
        let report = cost_per_drug(
            &sample_table(),
            &[Column::parse("Medikament")],
            SortOrder::Descending,
        )
        .expect("report builds");

        assert_eq!(report.group_by, vec!["Medikament".to_string()]);
        assert_eq!(report.headers()[0], "Medikament");
        assert_eq!(report.records()[0]["Medikament"], Value::from("A"));
    }
}
