use std::borrow::Cow;
use std::io::Read;
use std::path::Path;

use arrow::util::display::array_value_to_string;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{processing_days, OrderLine, RecordSet};
use crate::error::{LoadError, Result};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Columns every source must provide. Any other column is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    OrderId,
    OrderDate,
    ShipDate,
    ShipMode,
    CustomerName,
    Segment,
    State,
    Region,
    Category,
    SubCategory,
    Sales,
    Quantity,
    Discount,
    Profit,
}

impl Column {
    const ALL: [Column; 14] = [
        Column::OrderId,
        Column::OrderDate,
        Column::ShipDate,
        Column::ShipMode,
        Column::CustomerName,
        Column::Segment,
        Column::State,
        Column::Region,
        Column::Category,
        Column::SubCategory,
        Column::Sales,
        Column::Quantity,
        Column::Discount,
        Column::Profit,
    ];

    fn name(self) -> &'static str {
        match self {
            Column::OrderId => "Order ID",
            Column::OrderDate => "Order Date",
            Column::ShipDate => "Ship Date",
            Column::ShipMode => "Ship Mode",
            Column::CustomerName => "Customer Name",
            Column::Segment => "Segment",
            Column::State => "State",
            Column::Region => "Region",
            Column::Category => "Category",
            Column::SubCategory => "Sub-Category",
            Column::Sales => "Sales",
            Column::Quantity => "Quantity",
            Column::Discount => "Discount",
            Column::Profit => "Profit",
        }
    }
}

/// Header names of the required columns.
pub fn required_columns() -> impl Iterator<Item = &'static str> {
    Column::ALL.iter().map(|c| c.name())
}

/// Position of each required column within a source header.
struct ColumnIndex {
    positions: [usize; Column::ALL.len()],
}

impl ColumnIndex {
    fn resolve<S: AsRef<str>>(headers: &[S]) -> Result<Self> {
        let mut positions = [0usize; Column::ALL.len()];
        for (slot, column) in positions.iter_mut().zip(Column::ALL) {
            *slot = headers
                .iter()
                .position(|h| normalise_header(h.as_ref()) == column.name())
                .ok_or_else(|| LoadError::Schema {
                    column: column.name().to_string(),
                })?;
        }
        Ok(ColumnIndex { positions })
    }

    fn position(&self, column: Column) -> usize {
        self.positions[column as usize]
    }
}

fn normalise_header(h: &str) -> &str {
    h.trim_start_matches('\u{feff}').trim()
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Parsing options shared by every source format.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// chrono formats tried in order for the two date columns.
    pub date_formats: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            date_formats: vec!["%m/%d/%Y".to_string(), "%Y-%m-%d".to_string()],
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load an order-line table with default options.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` – delimited text with a header row (recommended)
/// * `.json`         – `[{ "Order ID": ..., "Sales": ..., ... }, ...]`
/// * `.parquet`      – one column per field; dates as strings, `Date32`,
///   `Date64` or timestamps
pub fn load_file(path: &Path) -> Result<RecordSet> {
    load_file_with(path, &LoadOptions::default())
}

/// Load an order-line table with explicit options.
///
/// The whole file is read up front; any I/O failure is a
/// [`LoadError::DataLoad`].
pub fn load_file_with(path: &Path, options: &LoadOptions) -> Result<RecordSet> {
    let format = Format::of(path)?;
    let bytes = std::fs::read(path).map_err(|source| LoadError::data_load(path, source))?;
    parse_source(path, format, bytes, options)
}

/// Load a source whose bytes were already read. `path` only selects the
/// format and names the source in logs.
pub fn load_bytes(path: &Path, bytes: Vec<u8>, options: &LoadOptions) -> Result<RecordSet> {
    parse_source(path, Format::of(path)?, bytes, options)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    Json,
    Parquet,
}

impl Format {
    fn of(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "csv" | "txt" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            "parquet" | "pq" => Ok(Format::Parquet),
            other => Err(LoadError::UnsupportedFormat(other.to_string())),
        }
    }
}

fn parse_source(path: &Path, format: Format, bytes: Vec<u8>, options: &LoadOptions) -> Result<RecordSet> {
    let records = match format {
        Format::Csv => load_csv_reader(bytes.as_slice(), options),
        Format::Json => load_json_slice(&bytes, options),
        Format::Parquet => load_parquet(Bytes::from(bytes), options),
    }?;

    info!(
        "Loaded {} order lines from {}",
        records.len(),
        path.display()
    );
    report_invariant_violations(&records);
    Ok(records)
}

/// Log lines that break ship ≥ order or sales ≥ 0. They are kept as-is.
fn report_invariant_violations(records: &RecordSet) {
    let shipped_early = records.iter().filter(|l| l.processing_time < 0).count();
    let negative_sales = records.iter().filter(|l| l.sales < 0.0).count();
    if shipped_early > 0 {
        warn!("{shipped_early} order lines ship before they were ordered");
    }
    if negative_sales > 0 {
        warn!("{negative_sales} order lines have negative sales");
    }
}

// ---------------------------------------------------------------------------
// Row parsing (shared by all formats)
// ---------------------------------------------------------------------------

/// Build an [`OrderLine`] from textual cells. `row` is 1-based (header excluded).
fn parse_line<'a, F>(row: usize, cell: F, options: &LoadOptions) -> Result<OrderLine>
where
    F: Fn(Column) -> Cow<'a, str>,
{
    let text = |c: Column| cell(c).trim().to_string();

    let order_date = parse_date(row, Column::OrderDate, &cell(Column::OrderDate), options)?;
    let ship_date = parse_date(row, Column::ShipDate, &cell(Column::ShipDate), options)?;

    Ok(OrderLine {
        order_id: text(Column::OrderId),
        customer_name: text(Column::CustomerName),
        order_date,
        ship_date,
        processing_time: processing_days(order_date, ship_date),
        category: text(Column::Category),
        sub_category: text(Column::SubCategory),
        region: text(Column::Region),
        state: text(Column::State),
        ship_mode: text(Column::ShipMode),
        segment: text(Column::Segment),
        sales: parse_float(row, Column::Sales, &cell(Column::Sales))?,
        profit: parse_float(row, Column::Profit, &cell(Column::Profit))?,
        quantity: parse_integer(row, Column::Quantity, &cell(Column::Quantity))?,
        discount: parse_float(row, Column::Discount, &cell(Column::Discount))?,
    })
}

fn invalid(row: usize, column: Column, value: &str, expected: &'static str) -> LoadError {
    LoadError::Validation {
        row,
        column: column.name(),
        value: value.to_string(),
        expected,
    }
}

fn parse_date(row: usize, column: Column, raw: &str, options: &LoadOptions) -> Result<NaiveDate> {
    let s = raw.trim();
    for fmt in &options.date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    // Spreadsheet exports ("2016-11-08 00:00:00") and Arrow-rendered
    // timestamps ("2016-11-08T00:00:00", optionally with an offset).
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    Err(invalid(row, column, s, "a date"))
}

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

fn parse_float(row: usize, column: Column, raw: &str) -> Result<f64> {
    let s = raw.trim();
    s.parse::<f64>()
        .map_err(|_| invalid(row, column, s, "a number"))
}

fn parse_integer(row: usize, column: Column, raw: &str) -> Result<i64> {
    let s = raw.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Ok(i);
    }
    // Float-typed exports write quantities as "2.0".
    match s.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f.is_finite() => Ok(f as i64),
        _ => Err(invalid(row, column, s, "an integer")),
    }
}

/// Decode a raw cell as UTF-8, falling back to Latin-1.
///
/// The reference dataset ships in Latin-1, where every byte maps directly to
/// the code point of the same value.
fn decode_cell(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Load CSV from any reader. The header row must name every required column.
pub fn load_csv_reader<R: Read>(reader: R, options: &LoadOptions) -> Result<RecordSet> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|h| decode_cell(h).into_owned())
        .collect();
    let index = ColumnIndex::resolve(&headers)?;
    debug!("CSV header: {headers:?}");

    let mut lines = Vec::new();
    let mut record = csv::ByteRecord::new();
    let mut row = 0;

    while reader.read_byte_record(&mut record)? {
        row += 1;
        let line = parse_line(
            row,
            |c| decode_cell(record.get(index.position(c)).unwrap_or_default()),
            options,
        )?;
        lines.push(line);
    }

    Ok(RecordSet::from_lines(lines))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   {
///     "Order ID": "CA-2016-152156",
///     "Order Date": "11/8/2016",
///     "Sales": 261.96,
///     ...
///   },
///   ...
/// ]
/// ```
fn load_json_slice(bytes: &[u8], options: &LoadOptions) -> Result<RecordSet> {
    let rows: Vec<serde_json::Map<String, JsonValue>> = serde_json::from_slice(bytes)?;

    let mut lines = Vec::with_capacity(rows.len());
    for (i, obj) in rows.iter().enumerate() {
        if let Some(missing) = Column::ALL.iter().find(|c| !obj.contains_key(c.name())) {
            return Err(LoadError::Schema {
                column: missing.name().to_string(),
            });
        }
        let line = parse_line(i + 1, |c| json_cell(obj.get(c.name())), options)?;
        lines.push(line);
    }

    Ok(RecordSet::from_lines(lines))
}

/// Load records-oriented JSON from a string.
pub fn load_json_str(text: &str, options: &LoadOptions) -> Result<RecordSet> {
    load_json_slice(text.as_bytes(), options)
}

fn json_cell(val: Option<&JsonValue>) -> Cow<'_, str> {
    match val {
        Some(JsonValue::String(s)) => Cow::Borrowed(s.as_str()),
        Some(JsonValue::Null) | None => Cow::Borrowed(""),
        Some(other) => Cow::Owned(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file written by Pandas (`df.to_parquet()`) or Polars.
///
/// Each cell goes through Arrow's display formatting, so numeric columns may
/// be any integer or float type and dates may be strings, `Date32`/`Date64`
/// or timestamps of any unit (all rendered ISO, which is always accepted
/// here).
fn load_parquet(data: Bytes, options: &LoadOptions) -> Result<RecordSet> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(data)?.build()?;

    let mut options = options.clone();
    if !options.date_formats.iter().any(|f| f == "%Y-%m-%d") {
        options.date_formats.push("%Y-%m-%d".to_string());
    }

    let mut lines = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;
        let schema = batch.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        let index = ColumnIndex::resolve(&names)?;

        for batch_row in 0..batch.num_rows() {
            // Render the row up front so the parser sees plain text.
            let mut cells = Vec::with_capacity(Column::ALL.len());
            for column in Column::ALL {
                let array = batch.column(index.position(column));
                cells.push(array_value_to_string(array.as_ref(), batch_row)?);
            }
            let line = parse_line(
                lines.len() + 1,
                |c| Cow::Borrowed(cells[c as usize].as_str()),
                &options,
            )?;
            lines.push(line);
        }
    }

    Ok(RecordSet::from_lines(lines))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Row ID,Order ID,Order Date,Ship Date,Ship Mode,Customer ID,Customer Name,Segment,Country,City,State,Postal Code,Region,Product ID,Category,Sub-Category,Product Name,Sales,Quantity,Discount,Profit";

    fn csv_with(rows: &[&str]) -> String {
        let mut s = String::from(HEADER);
        for r in rows {
            s.push('\n');
            s.push_str(r);
        }
        s
    }

    #[test]
    fn parses_superstore_row() {
        let text = csv_with(&[
            "1,CA-2016-152156,11/8/2016,11/11/2016,Second Class,CG-12520,Claire Gute,Consumer,United States,Henderson,Kentucky,42420,South,FUR-BO-10001798,Furniture,Bookcases,\"Bush Somerset Collection Bookcase\",261.96,2,0,41.9136",
        ]);
        let set = load_csv_reader(text.as_bytes(), &LoadOptions::default()).unwrap();

        assert_eq!(set.len(), 1);
        let line = &set.lines[0];
        assert_eq!(line.order_id, "CA-2016-152156");
        assert_eq!(line.order_date, NaiveDate::from_ymd_opt(2016, 11, 8).unwrap());
        assert_eq!(line.processing_time, 3);
        assert_eq!(line.sub_category, "Bookcases");
        assert_eq!(line.quantity, 2);
        assert!((line.profit - 41.9136).abs() < 1e-9);
    }

    #[test]
    fn missing_column_is_schema_error() {
        let text = "Order ID,Order Date,Ship Date\nA,1/1/2023,1/2/2023";
        let err = load_csv_reader(text.as_bytes(), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::Schema { ref column } if column == "Ship Mode"));
    }

    #[test]
    fn unparsable_date_is_validation_error() {
        let text = csv_with(&[
            "1,A,not-a-date,1/2/2023,Standard Class,C1,Ann,Consumer,US,X,Texas,1,Central,P1,Technology,Phones,Phone,10,1,0,1",
        ]);
        let err = load_csv_reader(text.as_bytes(), &LoadOptions::default()).unwrap_err();
        match err {
            LoadError::Validation { row, column, value, .. } => {
                assert_eq!(row, 1);
                assert_eq!(column, "Order Date");
                assert_eq!(value, "not-a-date");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn negative_processing_time_is_kept() {
        let text = csv_with(&[
            "1,A,1/5/2023,1/1/2023,Standard Class,C1,Ann,Consumer,US,X,Texas,1,Central,P1,Technology,Phones,Phone,10,1,0,1",
        ]);
        let set = load_csv_reader(text.as_bytes(), &LoadOptions::default()).unwrap();
        assert_eq!(set.lines[0].processing_time, -4);
    }

    #[test]
    fn latin1_cells_are_decoded() {
        let mut bytes = csv_with(&[]).into_bytes();
        bytes.extend_from_slice(b"\n1,A,1/1/2023,1/3/2023,Standard Class,C1,Jos");
        bytes.push(0xE9); // 'é' in Latin-1
        bytes.extend_from_slice(b",Consumer,US,X,Texas,1,Central,P1,Technology,Phones,Phone,10,1,0,1");

        let set = load_csv_reader(bytes.as_slice(), &LoadOptions::default()).unwrap();
        assert_eq!(set.lines[0].customer_name, "José");
    }

    #[test]
    fn bom_and_padding_in_header_are_ignored() {
        let text = format!(
            "\u{feff}{}\n1,A,2023-01-01,2023-01-02,First Class,C1,Ann,Corporate,US,X,Ohio,1,East,P1,Office Supplies,Paper,Paper,5.5,3,0.2,-1.5",
            HEADER.replace("Order Date", " Order Date ")
        );
        let set = load_csv_reader(text.as_bytes(), &LoadOptions::default()).unwrap();
        assert_eq!(set.lines[0].processing_time, 1);
        assert_eq!(set.lines[0].discount, 0.2);
    }

    #[test]
    fn json_records_load_with_numeric_cells() {
        let text = r#"[{
            "Order ID": "A", "Order Date": "2023-03-01", "Ship Date": "2023-03-04",
            "Ship Mode": "Same Day", "Customer Name": "Ann", "Segment": "Consumer",
            "State": "Utah", "Region": "West", "Category": "Technology",
            "Sub-Category": "Phones", "Sales": 100.5, "Quantity": 2,
            "Discount": 0.0, "Profit": -3.25
        }]"#;
        let set = load_json_str(text, &LoadOptions::default()).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.lines[0].quantity, 2);
        assert_eq!(set.lines[0].profit, -3.25);
        assert_eq!(set.lines[0].processing_time, 3);
    }

    #[test]
    fn json_missing_key_is_schema_error() {
        let text = r#"[{"Order ID": "A"}]"#;
        let err = load_json_str(text, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::Schema { .. }));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_file(Path::new("orders.xlsx")).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(ref e) if e == "xlsx"));
    }

    #[test]
    fn missing_file_is_data_load_error() {
        let err = load_file(Path::new("definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, LoadError::DataLoad { .. }));
    }

    #[test]
    fn iso_timestamps_are_accepted_as_dates() {
        let options = LoadOptions::default();
        let expected = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        for raw in [
            "2023-01-01T00:00:00",
            "2023-01-01T13:45:10.250",
            "2023-01-01 00:00:00",
            "2023-01-01T00:00:00+00:00",
            "2023-01-01T00:00:00Z",
        ] {
            assert_eq!(parse_date(1, Column::OrderDate, raw, &options).unwrap(), expected, "{raw}");
        }
    }

    #[test]
    fn load_bytes_parses_only_the_given_bytes() {
        let text = csv_with(&[
            "1,A,1/1/2023,1/3/2023,Standard Class,C1,Ann,Consumer,US,X,Texas,1,Central,P1,Technology,Phones,Phone,10,1,0,1",
        ]);
        // Nothing exists at this path; only its extension is used.
        let set = load_bytes(Path::new("never/written.csv"), text.into_bytes(), &LoadOptions::default()).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.lines[0].processing_time, 2);
    }

    #[test]
    fn directory_is_data_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.csv");
        std::fs::create_dir(&path).unwrap();
        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, LoadError::DataLoad { .. }), "{err:?}");
    }
}
