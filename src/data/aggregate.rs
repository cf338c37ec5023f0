use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{Months, NaiveDate};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

use super::model::{month_start, Dimension, KeyValue, Measure, OrderLine, Ratio};

// ---------------------------------------------------------------------------
// Group keys
// ---------------------------------------------------------------------------

/// One component of a grouping: which value of a line goes into the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyField {
    Dimension(Dimension),
    /// Calendar month of the order date (first day of the month).
    Month,
    Discount,
    /// Processing time in whole days.
    ProcessingTime,
}

impl KeyField {
    pub fn extract(self, line: &OrderLine) -> KeyValue {
        match self {
            KeyField::Dimension(dim) => KeyValue::Text(line.dimension(dim).to_string()),
            KeyField::Month => KeyValue::Month(month_start(line.order_date)),
            KeyField::Discount => KeyValue::number(line.discount),
            KeyField::ProcessingTime => KeyValue::Integer(line.processing_time),
        }
    }
}

impl From<Dimension> for KeyField {
    fn from(dim: Dimension) -> Self {
        KeyField::Dimension(dim)
    }
}

impl fmt::Display for KeyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyField::Dimension(dim) => write!(f, "{dim}"),
            KeyField::Month => f.write_str("Month"),
            KeyField::Discount => f.write_str("Discount"),
            KeyField::ProcessingTime => f.write_str("Processing Time"),
        }
    }
}

impl Serialize for KeyField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Ordered tuple of key values, one per grouping field.
pub type GroupKey = Vec<KeyValue>;

// ---------------------------------------------------------------------------
// Reductions
// ---------------------------------------------------------------------------

/// A named reduction applied to every group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregation {
    Sum(Measure),
    Mean(Measure),
    /// Number of distinct values of a dimension (e.g. distinct order ids).
    DistinctCount(Dimension),
    /// Number of lines.
    Count,
}

pub const SUM_SALES: Aggregation = Aggregation::Sum(Measure::Sales);
pub const SUM_PROFIT: Aggregation = Aggregation::Sum(Measure::Profit);
pub const DISTINCT_ORDERS: Aggregation = Aggregation::DistinctCount(Dimension::OrderId);

impl Aggregation {
    pub fn label(self) -> String {
        match self {
            Aggregation::Sum(m) => format!("sum_{}", m.label()),
            Aggregation::Mean(m) => format!("mean_{}", m.label()),
            Aggregation::DistinctCount(Dimension::OrderId) => "orders".to_string(),
            Aggregation::DistinctCount(d) => format!("distinct_{}", d.column_name()),
            Aggregation::Count => "count".to_string(),
        }
    }
}

/// Running state of one [`Aggregation`] within one group.
enum Reducer {
    Sum { measure: Measure, total: f64 },
    Mean { measure: Measure, total: f64, n: usize },
    Distinct { dimension: Dimension, seen: HashSet<String> },
    Count(usize),
}

impl Reducer {
    fn new(aggregation: Aggregation) -> Self {
        match aggregation {
            Aggregation::Sum(measure) => Reducer::Sum { measure, total: 0.0 },
            Aggregation::Mean(measure) => Reducer::Mean {
                measure,
                total: 0.0,
                n: 0,
            },
            Aggregation::DistinctCount(dimension) => Reducer::Distinct {
                dimension,
                seen: HashSet::new(),
            },
            Aggregation::Count => Reducer::Count(0),
        }
    }

    fn push(&mut self, line: &OrderLine) {
        match self {
            Reducer::Sum { measure, total } => *total += line.measure(*measure),
            Reducer::Mean { measure, total, n } => {
                *total += line.measure(*measure);
                *n += 1;
            }
            Reducer::Distinct { dimension, seen } => {
                let value = line.dimension(*dimension);
                if !seen.contains(value) {
                    seen.insert(value.to_string());
                }
            }
            Reducer::Count(n) => *n += 1,
        }
    }

    /// Final value. The mean of nothing is NaN; every other reduction of
    /// nothing is 0.
    fn finish(self) -> f64 {
        match self {
            Reducer::Sum { total, .. } => total,
            Reducer::Mean { total, n, .. } => {
                if n == 0 {
                    f64::NAN
                } else {
                    total / n as f64
                }
            }
            Reducer::Distinct { seen, .. } => seen.len() as f64,
            Reducer::Count(n) => n as f64,
        }
    }
}

/// A ratio of two aggregates, computed after grouping from the group totals
/// (never as a mean of per-line ratios).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedRatio {
    pub name: &'static str,
    pub numerator: Aggregation,
    pub denominator: Aggregation,
    pub scale: f64,
}

/// Profit / sales × 100.
pub const PROFIT_MARGIN_PCT: DerivedRatio = DerivedRatio {
    name: "profit_margin_pct",
    numerator: SUM_PROFIT,
    denominator: SUM_SALES,
    scale: 100.0,
};

// ---------------------------------------------------------------------------
// Result tables
// ---------------------------------------------------------------------------

/// Aggregated metrics of one group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub key: GroupKey,
    /// Number of lines in the group (0 only for dense-filled buckets).
    pub rows: usize,
    values: Vec<(Aggregation, f64)>,
    ratios: Vec<(&'static str, Ratio)>,
}

impl GroupRow {
    fn from_reducers(key: GroupKey, rows: usize, aggregations: &[Aggregation], reducers: Vec<Reducer>) -> Self {
        GroupRow {
            key,
            rows,
            values: aggregations
                .iter()
                .copied()
                .zip(reducers.into_iter().map(Reducer::finish))
                .collect(),
            ratios: Vec::new(),
        }
    }

    fn empty(key: GroupKey, aggregations: &[Aggregation]) -> Self {
        let reducers = aggregations.iter().copied().map(Reducer::new).collect();
        GroupRow::from_reducers(key, 0, aggregations, reducers)
    }

    /// Value of an aggregation computed for this group.
    pub fn value(&self, aggregation: Aggregation) -> Option<f64> {
        self.values
            .iter()
            .find(|(a, _)| *a == aggregation)
            .map(|(_, v)| *v)
    }

    /// `numerator / denominator` over this group's totals.
    pub fn ratio(&self, numerator: Aggregation, denominator: Aggregation) -> Ratio {
        match (self.value(numerator), self.value(denominator)) {
            (Some(n), Some(d)) => Ratio::of(n, d),
            _ => Ratio::Undefined,
        }
    }

    pub fn margin_pct(&self) -> Ratio {
        self.ratio(SUM_PROFIT, SUM_SALES).scale(100.0)
    }

    /// A ratio previously attached with [`AggregationResult::with_ratio`].
    pub fn derived(&self, name: &str) -> Option<Ratio> {
        self.ratios
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, r)| *r)
    }
}

struct Metrics<'a>(&'a [(Aggregation, f64)]);

impl Serialize for Metrics<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (agg, value) in self.0 {
            map.serialize_entry(&agg.label(), value)?;
        }
        map.end()
    }
}

struct Ratios<'a>(&'a [(&'static str, Ratio)]);

impl Serialize for Ratios<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, ratio) in self.0 {
            map.serialize_entry(name, ratio)?;
        }
        map.end()
    }
}

impl Serialize for GroupRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut row = serializer.serialize_struct("GroupRow", 4)?;
        row.serialize_field("key", &self.key)?;
        row.serialize_field("rows", &self.rows)?;
        row.serialize_field("metrics", &Metrics(&self.values))?;
        row.serialize_field("ratios", &Ratios(&self.ratios))?;
        row.end()
    }
}

/// Grouped metrics. Rows are kept in first-encountered order until a
/// sorting method is applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationResult {
    /// Grouping fields; empty when grouped by an arbitrary key function.
    pub keys: Vec<KeyField>,
    #[serde(skip)]
    pub aggregations: Vec<Aggregation>,
    pub rows: Vec<GroupRow>,
}

impl AggregationResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &[KeyValue]) -> Option<&GroupRow> {
        self.rows.iter().find(|r| r.key == key)
    }

    /// Sum of an aggregation across all groups.
    pub fn total(&self, aggregation: Aggregation) -> f64 {
        self.rows
            .iter()
            .filter_map(|r| r.value(aggregation))
            .filter(|v| !v.is_nan())
            .sum()
    }

    /// Attach a derived ratio to every row.
    pub fn with_ratio(mut self, ratio: &DerivedRatio) -> Self {
        for row in &mut self.rows {
            let value = row.ratio(ratio.numerator, ratio.denominator).scale(ratio.scale);
            row.ratios.retain(|(n, _)| *n != ratio.name);
            row.ratios.push((ratio.name, value));
        }
        self
    }

    /// Stable sort by an aggregation. Groups missing the value (or holding
    /// NaN) go last in either direction.
    pub fn sorted_by(mut self, aggregation: Aggregation, descending: bool) -> Self {
        self.rows.sort_by(|a, b| {
            compare_metric(a.value(aggregation), b.value(aggregation), descending)
        });
        self
    }

    /// Stable sort by group key, ascending.
    pub fn sorted_by_key(mut self) -> Self {
        self.rows.sort_by(|a, b| a.key.cmp(&b.key));
        self
    }

    /// Keys of the `n` groups with the largest value of `aggregation`.
    /// Ties keep first-encountered order.
    pub fn top_n(&self, aggregation: Aggregation, n: usize) -> Vec<&GroupKey> {
        let mut ranked: Vec<&GroupRow> = self.rows.iter().collect();
        ranked.sort_by(|a, b| compare_metric(a.value(aggregation), b.value(aggregation), true));
        ranked.into_iter().take(n).map(|r| &r.key).collect()
    }

    /// The `n` largest groups by `aggregation`, largest first.
    pub fn top(self, aggregation: Aggregation, n: usize) -> Self {
        self.sorted_by(aggregation, true).head(n)
    }

    /// Keep the first `n` rows in their current order.
    pub fn head(mut self, n: usize) -> Self {
        self.rows.truncate(n);
        self
    }
}

fn compare_metric(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    let a = a.filter(|v| !v.is_nan());
    let b = b.filter(|v| !v.is_nan());
    match (a, b) {
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// ---------------------------------------------------------------------------
// Group-by
// ---------------------------------------------------------------------------

/// Group `lines` by the key `key_fn` extracts and reduce each group with
/// `aggregations`.
pub fn group_by<F>(lines: &[OrderLine], key_fn: F, aggregations: &[Aggregation]) -> AggregationResult
where
    F: Fn(&OrderLine) -> GroupKey,
{
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<(GroupKey, usize, Vec<Reducer>)> = Vec::new();

    for line in lines {
        let key = key_fn(line);
        let slot = match index.get(&key) {
            Some(&slot) => slot,
            None => {
                let slot = groups.len();
                index.insert(key.clone(), slot);
                let reducers = aggregations.iter().copied().map(Reducer::new).collect();
                groups.push((key, 0, reducers));
                slot
            }
        };
        let (_, rows, reducers) = &mut groups[slot];
        *rows += 1;
        for reducer in reducers.iter_mut() {
            reducer.push(line);
        }
    }

    AggregationResult {
        keys: Vec::new(),
        aggregations: aggregations.to_vec(),
        rows: groups
            .into_iter()
            .map(|(key, rows, reducers)| GroupRow::from_reducers(key, rows, aggregations, reducers))
            .collect(),
    }
}

/// Group by an ordered list of fields, e.g. `[Category, SubCategory]`.
pub fn group_by_fields(
    lines: &[OrderLine],
    keys: &[KeyField],
    aggregations: &[Aggregation],
) -> AggregationResult {
    let mut result = group_by(
        lines,
        |line| keys.iter().map(|k| k.extract(line)).collect(),
        aggregations,
    );
    result.keys = keys.to_vec();
    result
}

// ---------------------------------------------------------------------------
// Monthly buckets
// ---------------------------------------------------------------------------

/// How to treat months without any line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bucketing {
    /// Omit empty months.
    #[default]
    Sparse,
    /// Fill every month between the first and last bucket; sums and counts
    /// are 0 and means NaN in filled months.
    Dense,
}

/// Group by order month, chronologically.
pub fn monthly(lines: &[OrderLine], aggregations: &[Aggregation], bucketing: Bucketing) -> AggregationResult {
    let result = group_by_fields(lines, &[KeyField::Month], aggregations).sorted_by_key();
    match bucketing {
        Bucketing::Sparse => result,
        Bucketing::Dense => densify_months(result),
    }
}

fn bucket_month(row: &GroupRow) -> Option<NaiveDate> {
    match row.key.first() {
        Some(KeyValue::Month(d)) => Some(*d),
        _ => None,
    }
}

fn densify_months(mut result: AggregationResult) -> AggregationResult {
    let first = result.rows.first().and_then(bucket_month);
    let last = result.rows.last().and_then(bucket_month);
    let (Some(first), Some(last)) = (first, last) else {
        return result;
    };

    let mut by_month: HashMap<NaiveDate, GroupRow> = result
        .rows
        .drain(..)
        .filter_map(|row| bucket_month(&row).map(|m| (m, row)))
        .collect();

    let mut month = first;
    loop {
        let row = by_month
            .remove(&month)
            .unwrap_or_else(|| GroupRow::empty(vec![KeyValue::Month(month)], &result.aggregations));
        result.rows.push(row);
        if month >= last {
            break;
        }
        match month.checked_add_months(Months::new(1)) {
            Some(next) => month = next,
            None => break,
        }
    }
    result
}
