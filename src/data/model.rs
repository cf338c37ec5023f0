use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Dimension / Measure – the named columns of an order line
// ---------------------------------------------------------------------------

/// Categorical attributes of an order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Category,
    SubCategory,
    Region,
    State,
    ShipMode,
    Segment,
    CustomerName,
    OrderId,
}

impl Dimension {
    /// Dimensions exposed to the filter controls, in sidebar order.
    pub const FILTERABLE: [Dimension; 6] = [
        Dimension::Category,
        Dimension::SubCategory,
        Dimension::Region,
        Dimension::State,
        Dimension::ShipMode,
        Dimension::Segment,
    ];

    /// Header name of the column in the source table.
    pub fn column_name(self) -> &'static str {
        match self {
            Dimension::Category => "Category",
            Dimension::SubCategory => "Sub-Category",
            Dimension::Region => "Region",
            Dimension::State => "State",
            Dimension::ShipMode => "Ship Mode",
            Dimension::Segment => "Segment",
            Dimension::CustomerName => "Customer Name",
            Dimension::OrderId => "Order ID",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Numeric attributes of an order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Measure {
    Sales,
    Profit,
    Quantity,
    Discount,
    ProcessingTime,
}

impl Measure {
    pub fn label(self) -> &'static str {
        match self {
            Measure::Sales => "sales",
            Measure::Profit => "profit",
            Measure::Quantity => "quantity",
            Measure::Discount => "discount",
            Measure::ProcessingTime => "processing_time",
        }
    }
}

// ---------------------------------------------------------------------------
// KeyValue – one component of a group key
// ---------------------------------------------------------------------------

/// A single group-key component. Group keys live in hash maps and get sorted,
/// so `KeyValue` must be `Eq + Ord + Hash` even though it can hold an `f64`.
///
/// Numbers compare and hash by their canonical form: `-0.0` equals `0.0` and
/// all NaNs are one value.
#[derive(Debug, Clone)]
pub enum KeyValue {
    Text(String),
    /// First day of a calendar month.
    Month(NaiveDate),
    Integer(i64),
    Number(f64),
}

impl KeyValue {
    /// A numeric key in canonical form.
    pub fn number(v: f64) -> Self {
        KeyValue::Number(canonical_f64(v))
    }
}

fn canonical_f64(v: f64) -> f64 {
    if v.is_nan() {
        f64::NAN
    } else if v == 0.0 {
        0.0
    } else {
        v
    }
}

// -- Manual Eq/Ord so floats can be part of a key --

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for KeyValue {}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use KeyValue::*;
        fn discriminant(v: &KeyValue) -> u8 {
            match v {
                Integer(_) => 0,
                Number(_) => 1,
                Month(_) => 2,
                Text(_) => 3,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Integer(a), Integer(b)) => a.cmp(b),
            (Number(a), Number(b)) => canonical_f64(*a).total_cmp(&canonical_f64(*b)),
            (Month(a), Month(b)) => a.cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for KeyValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            KeyValue::Text(s) => s.hash(state),
            KeyValue::Month(d) => d.hash(state),
            KeyValue::Integer(i) => i.hash(state),
            KeyValue::Number(f) => canonical_f64(*f).to_bits().hash(state),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Text(s) => write!(f, "{s}"),
            KeyValue::Month(d) => write!(f, "{}", d.format("%Y-%m")),
            KeyValue::Integer(i) => write!(f, "{i}"),
            KeyValue::Number(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for KeyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            KeyValue::Text(s) => serializer.serialize_str(s),
            KeyValue::Month(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
            KeyValue::Integer(i) => serializer.serialize_i64(*i),
            KeyValue::Number(v) => serializer.serialize_f64(*v),
        }
    }
}

impl From<&str> for KeyValue {
    fn from(s: &str) -> Self {
        KeyValue::Text(s.to_string())
    }
}

impl From<NaiveDate> for KeyValue {
    fn from(d: NaiveDate) -> Self {
        KeyValue::Month(month_start(d))
    }
}

/// First day of the calendar month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

// ---------------------------------------------------------------------------
// Ratio – derived ratios with an explicit "undefined" state
// ---------------------------------------------------------------------------

/// Result of dividing two aggregates. A zero denominator yields
/// [`Ratio::Undefined`] instead of an error, `inf`, or `0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ratio {
    Defined(f64),
    Undefined,
}

impl Ratio {
    pub fn of(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 {
            Ratio::Undefined
        } else {
            Ratio::Defined(numerator / denominator)
        }
    }

    /// `numerator / denominator × 100`.
    pub fn percent(numerator: f64, denominator: f64) -> Self {
        Ratio::of(numerator, denominator).scale(100.0)
    }

    pub fn scale(self, factor: f64) -> Self {
        match self {
            Ratio::Defined(v) => Ratio::Defined(v * factor),
            Ratio::Undefined => Ratio::Undefined,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Ratio::Defined(v) => Some(v),
            Ratio::Undefined => None,
        }
    }

    pub fn is_undefined(self) -> bool {
        matches!(self, Ratio::Undefined)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ratio::Defined(v) => write!(f, "{v:.1}"),
            Ratio::Undefined => write!(f, "n/a"),
        }
    }
}

impl Serialize for Ratio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// OrderLine – one row of the source table
// ---------------------------------------------------------------------------

/// A single order line item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLine {
    pub order_id: String,
    pub customer_name: String,
    pub order_date: NaiveDate,
    pub ship_date: NaiveDate,
    /// `ship_date - order_date` in whole days. Negative when the source
    /// violates ship ≥ order; never corrected.
    pub processing_time: i64,
    pub category: String,
    pub sub_category: String,
    pub region: String,
    pub state: String,
    pub ship_mode: String,
    pub segment: String,
    pub sales: f64,
    pub profit: f64,
    pub quantity: i64,
    pub discount: f64,
}

impl OrderLine {
    /// A line with the given id and dates; everything else blank or zero.
    pub fn new(order_id: impl Into<String>, order_date: NaiveDate, ship_date: NaiveDate) -> Self {
        OrderLine {
            order_id: order_id.into(),
            customer_name: String::new(),
            order_date,
            ship_date,
            processing_time: processing_days(order_date, ship_date),
            category: String::new(),
            sub_category: String::new(),
            region: String::new(),
            state: String::new(),
            ship_mode: String::new(),
            segment: String::new(),
            sales: 0.0,
            profit: 0.0,
            quantity: 0,
            discount: 0.0,
        }
    }

    pub fn with_dimension(mut self, dimension: Dimension, value: impl Into<String>) -> Self {
        *self.dimension_mut(dimension) = value.into();
        self
    }

    pub fn with_sales(mut self, sales: f64) -> Self {
        self.sales = sales;
        self
    }

    pub fn with_profit(mut self, profit: f64) -> Self {
        self.profit = profit;
        self
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_discount(mut self, discount: f64) -> Self {
        self.discount = discount;
        self
    }

    /// Value of a categorical attribute.
    pub fn dimension(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::Category => &self.category,
            Dimension::SubCategory => &self.sub_category,
            Dimension::Region => &self.region,
            Dimension::State => &self.state,
            Dimension::ShipMode => &self.ship_mode,
            Dimension::Segment => &self.segment,
            Dimension::CustomerName => &self.customer_name,
            Dimension::OrderId => &self.order_id,
        }
    }

    fn dimension_mut(&mut self, dimension: Dimension) -> &mut String {
        match dimension {
            Dimension::Category => &mut self.category,
            Dimension::SubCategory => &mut self.sub_category,
            Dimension::Region => &mut self.region,
            Dimension::State => &mut self.state,
            Dimension::ShipMode => &mut self.ship_mode,
            Dimension::Segment => &mut self.segment,
            Dimension::CustomerName => &mut self.customer_name,
            Dimension::OrderId => &mut self.order_id,
        }
    }

    /// Value of a numeric attribute as `f64`.
    pub fn measure(&self, measure: Measure) -> f64 {
        match measure {
            Measure::Sales => self.sales,
            Measure::Profit => self.profit,
            Measure::Quantity => self.quantity as f64,
            Measure::Discount => self.discount,
            Measure::ProcessingTime => self.processing_time as f64,
        }
    }
}

/// Whole days from `order_date` to `ship_date` (negative if shipped first).
pub fn processing_days(order_date: NaiveDate, ship_date: NaiveDate) -> i64 {
    (ship_date - order_date).num_days()
}

// ---------------------------------------------------------------------------
// RecordSet – the loaded (or filtered) table
// ---------------------------------------------------------------------------

/// An immutable set of order lines with its pre-computed domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordSet {
    /// All lines, in source order.
    pub lines: Vec<OrderLine>,
    /// For each filterable dimension the sorted set of unique values.
    pub domain: BTreeMap<Dimension, BTreeSet<String>>,
    /// Earliest and latest order date; `None` when empty.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

impl RecordSet {
    /// Build the domain index from the given lines.
    pub fn from_lines(lines: Vec<OrderLine>) -> Self {
        let mut domain: BTreeMap<Dimension, BTreeSet<String>> = Dimension::FILTERABLE
            .iter()
            .map(|&dim| (dim, BTreeSet::new()))
            .collect();
        let mut date_range: Option<(NaiveDate, NaiveDate)> = None;

        for line in &lines {
            for dim in Dimension::FILTERABLE {
                domain
                    .entry(dim)
                    .or_default()
                    .insert(line.dimension(dim).to_string());
            }
            date_range = Some(match date_range {
                None => (line.order_date, line.order_date),
                Some((lo, hi)) => (lo.min(line.order_date), hi.max(line.order_date)),
            });
        }

        RecordSet {
            lines,
            domain,
            date_range,
        }
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OrderLine> {
        self.lines.iter()
    }

    /// Unique values of a filterable dimension.
    pub fn values(&self, dimension: Dimension) -> Option<&BTreeSet<String>> {
        self.domain.get(&dimension)
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a OrderLine;
    type IntoIter = std::slice::Iter<'a, OrderLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn processing_time_is_whole_days() {
        let line = OrderLine::new("CA-1", date(2023, 1, 1), date(2023, 1, 5));
        assert_eq!(line.processing_time, 4);
    }

    #[test]
    fn negative_processing_time_passes_through() {
        let line = OrderLine::new("CA-1", date(2023, 1, 5), date(2023, 1, 1));
        assert_eq!(line.processing_time, -4);
    }

    #[test]
    fn ratio_with_zero_denominator_is_undefined() {
        assert_eq!(Ratio::of(10.0, 0.0), Ratio::Undefined);
        assert_eq!(Ratio::percent(0.0, 0.0), Ratio::Undefined);
        assert_eq!(Ratio::percent(1.0, 4.0), Ratio::Defined(25.0));
        assert_eq!(serde_json::to_string(&Ratio::Undefined).unwrap(), "null");
    }

    #[test]
    fn key_values_order_within_and_across_variants() {
        let mut keys = vec![
            KeyValue::Text("b".into()),
            KeyValue::Number(0.2),
            KeyValue::Text("a".into()),
            KeyValue::Integer(3),
            KeyValue::Number(0.1),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                KeyValue::Integer(3),
                KeyValue::Number(0.1),
                KeyValue::Number(0.2),
                KeyValue::Text("a".into()),
                KeyValue::Text("b".into()),
            ]
        );
    }

    #[test]
    fn signed_zero_and_nan_keys_hash_consistently() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        fn hash(v: &KeyValue) -> u64 {
            let mut h = DefaultHasher::new();
            v.hash(&mut h);
            h.finish()
        }

        let zero = KeyValue::Number(0.0);
        let neg_zero = KeyValue::Number(-0.0);
        assert_eq!(zero, neg_zero);
        assert_eq!(hash(&zero), hash(&neg_zero));

        let nan = KeyValue::Number(f64::NAN);
        let other_nan = KeyValue::Number(-f64::NAN);
        assert_eq!(nan, nan.clone());
        assert_eq!(nan, other_nan);
        assert_eq!(hash(&nan), hash(&other_nan));
        assert!(nan > KeyValue::Number(f64::INFINITY));
    }

    #[test]
    fn month_key_normalises_to_first_day() {
        assert_eq!(
            KeyValue::from(date(2023, 3, 17)),
            KeyValue::Month(date(2023, 3, 1))
        );
    }

    #[test]
    fn domain_collects_unique_filterable_values() {
        let lines = vec![
            OrderLine::new("A", date(2023, 2, 1), date(2023, 2, 3))
                .with_dimension(Dimension::Region, "West"),
            OrderLine::new("B", date(2023, 1, 1), date(2023, 1, 3))
                .with_dimension(Dimension::Region, "East"),
            OrderLine::new("C", date(2023, 3, 1), date(2023, 3, 3))
                .with_dimension(Dimension::Region, "West"),
        ];
        let set = RecordSet::from_lines(lines);

        let regions: Vec<&str> = set
            .values(Dimension::Region)
            .unwrap()
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(regions, vec!["East", "West"]);
        assert_eq!(set.date_range, Some((date(2023, 1, 1), date(2023, 3, 1))));
        assert!(set.values(Dimension::OrderId).is_none());
    }

    #[test]
    fn empty_set_has_no_date_range() {
        let set = RecordSet::from_lines(Vec::new());
        assert!(set.is_empty());
        assert_eq!(set.date_range, None);
        assert!(set.values(Dimension::Category).unwrap().is_empty());
    }
}
