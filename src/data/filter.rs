use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::model::{Dimension, OrderLine, RecordSet};

// ---------------------------------------------------------------------------
// FilterSpec: date window + selected values per dimension
// ---------------------------------------------------------------------------

/// Immutable filter configuration handed to the pipeline by the filter
/// controls.
///
/// * A dimension absent from `allowed` is unconstrained.
/// * A dimension present with an empty set admits nothing, so the whole
///   filtered subset is empty. There is no "empty means all" fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default = "earliest")]
    start: NaiveDate,
    #[serde(default = "latest")]
    end: NaiveDate,
    #[serde(default)]
    allowed: BTreeMap<Dimension, BTreeSet<String>>,
}

fn earliest() -> NaiveDate {
    NaiveDate::MIN
}

fn latest() -> NaiveDate {
    NaiveDate::MAX
}

impl Default for FilterSpec {
    /// Unconstrained: every date, every value.
    fn default() -> Self {
        FilterSpec::new(earliest(), latest())
    }
}

impl FilterSpec {
    /// A spec restricting only the order-date window (inclusive).
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        FilterSpec {
            start,
            end,
            allowed: BTreeMap::new(),
        }
    }

    /// Select the full domain of `records`: its whole order-date range and
    /// every value of every filterable dimension. This is the state of the
    /// filter controls right after a load.
    pub fn full(records: &RecordSet) -> Self {
        let (start, end) = records.date_range.unwrap_or((earliest(), latest()));
        FilterSpec {
            start,
            end,
            allowed: records.domain.clone(),
        }
    }

    pub fn with_date_range(self, start: NaiveDate, end: NaiveDate) -> Self {
        FilterSpec { start, end, ..self }
    }

    /// Replace the allowed set of one dimension.
    pub fn with_allowed<I, S>(mut self, dimension: Dimension, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed
            .insert(dimension, values.into_iter().map(Into::into).collect());
        self
    }

    /// Deselect one value. No-op for an unconstrained dimension.
    pub fn without_value(mut self, dimension: Dimension, value: &str) -> Self {
        if let Some(selected) = self.allowed.get_mut(&dimension) {
            selected.remove(value);
        }
        self
    }

    /// Remove the constraint on a dimension entirely.
    pub fn unconstrained(mut self, dimension: Dimension) -> Self {
        self.allowed.remove(&dimension);
        self
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Allowed values for `dimension`; `None` means unconstrained.
    pub fn allowed(&self, dimension: Dimension) -> Option<&BTreeSet<String>> {
        self.allowed.get(&dimension)
    }

    /// Whether any constrained dimension has nothing selected.
    pub fn selects_nothing(&self) -> bool {
        self.start > self.end || self.allowed.values().any(BTreeSet::is_empty)
    }

    /// A line passes when its order date is inside `[start, end]` and its
    /// value for every constrained dimension is selected.
    pub fn matches(&self, line: &OrderLine) -> bool {
        if line.order_date < self.start || line.order_date > self.end {
            return false;
        }
        self.allowed
            .iter()
            .all(|(dim, selected)| selected.contains(line.dimension(*dim)))
    }

    /// Deterministic serialization used as a cache key. `BTreeMap`/`BTreeSet`
    /// keep dimensions and values sorted, so equal specs give equal keys.
    pub fn canonical_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

// ---------------------------------------------------------------------------
// Applying a spec
// ---------------------------------------------------------------------------

/// Return indices of lines that pass `spec`, in source order.
pub fn filtered_indices(records: &RecordSet, spec: &FilterSpec) -> Vec<usize> {
    if spec.selects_nothing() {
        // Nothing selected for some column → hide everything
        return Vec::new();
    }
    records
        .lines
        .iter()
        .enumerate()
        .filter(|(_, line)| spec.matches(line))
        .map(|(i, _)| i)
        .collect()
}

/// The subset of `records` passing `spec`, with stable order and a freshly
/// computed domain. `records` is never modified.
pub fn apply(records: &RecordSet, spec: &FilterSpec) -> RecordSet {
    let lines = filtered_indices(records, spec)
        .into_iter()
        .map(|i| records.lines[i].clone())
        .collect();
    RecordSet::from_lines(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> RecordSet {
        let line = |id: &str, day: u32, region: &str, category: &str| {
            OrderLine::new(id, date(2023, 1, day), date(2023, 1, day + 2))
                .with_dimension(Dimension::Region, region)
                .with_dimension(Dimension::Category, category)
                .with_sales(10.0)
        };
        RecordSet::from_lines(vec![
            line("A", 1, "West", "Furniture"),
            line("B", 5, "East", "Technology"),
            line("C", 10, "West", "Technology"),
            line("D", 20, "South", "Furniture"),
        ])
    }

    fn ids(set: &RecordSet) -> Vec<&str> {
        set.iter().map(|l| l.order_id.as_str()).collect()
    }

    #[test]
    fn full_spec_is_identity() {
        let records = sample();
        let spec = FilterSpec::full(&records);
        assert_eq!(apply(&records, &spec), records);
        assert_eq!(apply(&records, &FilterSpec::default()), records);
    }

    #[test]
    fn date_window_is_inclusive() {
        let records = sample();
        let spec = FilterSpec::full(&records).with_date_range(date(2023, 1, 5), date(2023, 1, 10));
        assert_eq!(ids(&apply(&records, &spec)), vec!["B", "C"]);
    }

    #[test]
    fn predicates_are_conjunctive() {
        let records = sample();
        let spec = FilterSpec::full(&records)
            .with_allowed(Dimension::Region, ["West"])
            .with_allowed(Dimension::Category, ["Technology"]);
        assert_eq!(ids(&apply(&records, &spec)), vec!["C"]);
    }

    #[test]
    fn empty_selection_yields_empty_subset() {
        let records = sample();
        let spec = FilterSpec::full(&records).with_allowed(Dimension::Segment, Vec::<String>::new());
        assert!(spec.selects_nothing());
        assert!(apply(&records, &spec).is_empty());
    }

    #[test]
    fn deselecting_a_value_narrows_the_subset() {
        let records = sample();
        let spec = FilterSpec::full(&records).without_value(Dimension::Region, "West");
        assert_eq!(ids(&apply(&records, &spec)), vec!["B", "D"]);
    }

    #[test]
    fn without_value_on_unconstrained_dimension_is_noop() {
        let spec = FilterSpec::default().without_value(Dimension::State, "Texas");
        assert_eq!(spec, FilterSpec::default());
    }

    #[test]
    fn inverted_window_selects_nothing() {
        let records = sample();
        let spec = FilterSpec::new(date(2023, 2, 1), date(2023, 1, 1));
        assert!(filtered_indices(&records, &spec).is_empty());
    }

    #[test]
    fn apply_does_not_touch_input() {
        let records = sample();
        let before = records.clone();
        let spec = FilterSpec::full(&records).with_allowed(Dimension::Region, ["East"]);
        let first = apply(&records, &spec);
        let second = apply(&records, &spec);
        assert_eq!(records, before);
        assert_eq!(first, second);
    }

    #[test]
    fn canonical_key_ignores_insertion_order() {
        let a = FilterSpec::default()
            .with_allowed(Dimension::Region, ["West", "East"])
            .with_allowed(Dimension::Category, ["Furniture"]);
        let b = FilterSpec::default()
            .with_allowed(Dimension::Category, ["Furniture"])
            .with_allowed(Dimension::Region, ["East", "West"]);
        assert_eq!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn deserializes_partial_json() {
        let spec: FilterSpec =
            serde_json::from_str(r#"{"start":"2023-01-05","allowed":{"Region":["West"]}}"#).unwrap();
        assert_eq!(spec.start(), date(2023, 1, 5));
        assert_eq!(spec.end(), NaiveDate::MAX);
        assert_eq!(ids(&apply(&sample(), &spec)), vec!["C"]);
    }
}
