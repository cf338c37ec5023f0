use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Days, NaiveDate};
use parquet::arrow::ArrowWriter;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.below(items.len())]
    }
}

const CATEGORIES: &[(&str, &[&str])] = &[
    ("Furniture", &["Bookcases", "Chairs", "Furnishings", "Tables"]),
    ("Office Supplies", &["Binders", "Paper", "Storage", "Art", "Labels"]),
    ("Technology", &["Phones", "Accessories", "Machines", "Copiers"]),
];

const REGIONS: &[(&str, &[&str])] = &[
    ("West", &["California", "Washington", "Arizona", "Colorado"]),
    ("East", &["New York", "Pennsylvania", "Ohio", "Delaware"]),
    ("Central", &["Texas", "Illinois", "Michigan", "Indiana"]),
    ("South", &["Florida", "Georgia", "Kentucky", "Virginia"]),
];

/// Ship mode with its (min, max) processing days.
const SHIP_MODES: &[(&str, u64, u64)] = &[
    ("Same Day", 0, 0),
    ("First Class", 1, 3),
    ("Second Class", 2, 5),
    ("Standard Class", 4, 7),
];

const SEGMENTS: &[&str] = &["Consumer", "Corporate", "Home Office"];

const CUSTOMERS: &[&str] = &[
    "Claire Gute",
    "Darrin Van Huff",
    "Sean O'Donnell",
    "Brosina Hoffman",
    "Andrew Allen",
    "Irene Maddox",
    "Harold Pawlan",
    "Zuschuss Donatelli",
    "José Ramírez",
    "Zoë Müller",
    "Ken Black",
    "Sandra Flanagan",
];

const DISCOUNTS: &[f64] = &[0.0, 0.0, 0.0, 0.1, 0.2, 0.2, 0.3, 0.5, 0.8];

struct Row {
    order_id: String,
    order_date: NaiveDate,
    ship_date: NaiveDate,
    ship_mode: &'static str,
    customer: &'static str,
    segment: &'static str,
    state: &'static str,
    region: &'static str,
    category: &'static str,
    sub_category: &'static str,
    sales: f64,
    quantity: i64,
    discount: f64,
    profit: f64,
}

fn generate(n_lines: usize, rng: &mut SimpleRng) -> Result<Vec<Row>> {
    let first_day = NaiveDate::from_ymd_opt(2020, 1, 1).context("invalid start date")?;
    let mut rows = Vec::with_capacity(n_lines);
    let mut order_no = 100_000;

    while rows.len() < n_lines {
        // One order: shared header fields, 1–4 lines.
        order_no += 1;
        let order_date = first_day
            .checked_add_days(Days::new(rng.below(4 * 365) as u64))
            .context("order date out of range")?;
        let &(ship_mode, min_days, max_days) = rng.pick(SHIP_MODES);
        let ship_days = min_days + rng.below((max_days - min_days + 1) as usize) as u64;
        let ship_date = order_date
            .checked_add_days(Days::new(ship_days))
            .context("ship date out of range")?;
        let &(region, states) = rng.pick(REGIONS);
        let state = *rng.pick(states);
        let customer = *rng.pick(CUSTOMERS);
        let segment = *rng.pick(SEGMENTS);
        let order_id = format!("{}-{}-{order_no}", &region[..2].to_uppercase(), order_date.format("%Y"));

        let n = 1 + rng.below(4);
        for _ in 0..n.min(n_lines - rows.len()) {
            let &(category, subs) = rng.pick(CATEGORIES);
            let sub_category = *rng.pick(subs);
            let quantity = 1 + rng.below(9) as i64;
            let unit_price = 5.0 + rng.next_f64() * 400.0;
            let discount = *rng.pick(DISCOUNTS);
            let sales = (unit_price * quantity as f64 * (1.0 - discount) * 100.0).round() / 100.0;
            // Heavy discounts turn lines into losses.
            let margin = 0.05 + rng.next_f64() * 0.3 - discount * 0.9;
            let profit = (sales * margin * 10_000.0).round() / 10_000.0;

            rows.push(Row {
                order_id: order_id.clone(),
                order_date,
                ship_date,
                ship_mode,
                customer,
                segment,
                state,
                region,
                category,
                sub_category,
                sales,
                quantity,
                discount,
                profit,
            });
        }
    }
    Ok(rows)
}

fn write_csv(path: &str, rows: &[Row]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {path}"))?;
    writer.write_record([
        "Row ID",
        "Order ID",
        "Order Date",
        "Ship Date",
        "Ship Mode",
        "Customer Name",
        "Segment",
        "Country",
        "State",
        "Region",
        "Category",
        "Sub-Category",
        "Sales",
        "Quantity",
        "Discount",
        "Profit",
    ])?;
    for (i, r) in rows.iter().enumerate() {
        writer.write_record([
            (i + 1).to_string(),
            r.order_id.clone(),
            r.order_date.format("%-m/%-d/%Y").to_string(),
            r.ship_date.format("%-m/%-d/%Y").to_string(),
            r.ship_mode.to_string(),
            r.customer.to_string(),
            r.segment.to_string(),
            "United States".to_string(),
            r.state.to_string(),
            r.region.to_string(),
            r.category.to_string(),
            r.sub_category.to_string(),
            r.sales.to_string(),
            r.quantity.to_string(),
            r.discount.to_string(),
            r.profit.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &str, rows: &[Row]) -> Result<()> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).context("invalid epoch")?;
    let days = |d: NaiveDate| (d - epoch).num_days() as i32;
    let text = |f: fn(&Row) -> &str| -> ArrayRef {
        Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>()))
    };

    let schema = Arc::new(Schema::new(vec![
        Field::new("Order ID", DataType::Utf8, false),
        Field::new("Order Date", DataType::Date32, false),
        Field::new("Ship Date", DataType::Date32, false),
        Field::new("Ship Mode", DataType::Utf8, false),
        Field::new("Customer Name", DataType::Utf8, false),
        Field::new("Segment", DataType::Utf8, false),
        Field::new("State", DataType::Utf8, false),
        Field::new("Region", DataType::Utf8, false),
        Field::new("Category", DataType::Utf8, false),
        Field::new("Sub-Category", DataType::Utf8, false),
        Field::new("Sales", DataType::Float64, false),
        Field::new("Quantity", DataType::Int64, false),
        Field::new("Discount", DataType::Float64, false),
        Field::new("Profit", DataType::Float64, false),
    ]));

    let columns: Vec<ArrayRef> = vec![
        text(|r| r.order_id.as_str()),
        Arc::new(Date32Array::from(rows.iter().map(|r| days(r.order_date)).collect::<Vec<_>>())),
        Arc::new(Date32Array::from(rows.iter().map(|r| days(r.ship_date)).collect::<Vec<_>>())),
        text(|r| r.ship_mode),
        text(|r| r.customer),
        text(|r| r.segment),
        text(|r| r.state),
        text(|r| r.region),
        text(|r| r.category),
        text(|r| r.sub_category),
        Arc::new(Float64Array::from(rows.iter().map(|r| r.sales).collect::<Vec<_>>())),
        Arc::new(Int64Array::from(rows.iter().map(|r| r.quantity).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(rows.iter().map(|r| r.discount).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(rows.iter().map(|r| r.profit).collect::<Vec<_>>())),
    ];

    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;
    let file = std::fs::File::create(path).with_context(|| format!("creating {path}"))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    let n_lines: usize = match std::env::args().nth(1) {
        Some(arg) => arg.parse().with_context(|| format!("invalid line count '{arg}'"))?,
        None => 2_000,
    };

    let mut rng = SimpleRng::new(42);
    let rows = generate(n_lines, &mut rng)?;

    write_csv("sample_superstore.csv", &rows)?;
    write_parquet("sample_superstore.parquet", &rows)?;

    println!(
        "Wrote {} order lines to sample_superstore.csv and sample_superstore.parquet",
        rows.len()
    );
    Ok(())
}
