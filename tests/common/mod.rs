//! Shared fixtures for integration tests

#![allow(dead_code)]

use chrono::NaiveDate;
use superstore_dash::{Dimension, OrderLine, RecordSet};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Compact description of one fixture line.
pub struct Spec<'a> {
    pub id: &'a str,
    pub ordered: NaiveDate,
    pub shipped_after: u64,
    pub category: &'a str,
    pub sub_category: &'a str,
    pub region: &'a str,
    pub state: &'a str,
    pub ship_mode: &'a str,
    pub segment: &'a str,
    pub customer: &'a str,
    pub sales: f64,
    pub profit: f64,
    pub discount: f64,
}

pub fn line(s: &Spec) -> OrderLine {
    let shipped = s.ordered + chrono::Days::new(s.shipped_after);
    OrderLine::new(s.id, s.ordered, shipped)
        .with_dimension(Dimension::Category, s.category)
        .with_dimension(Dimension::SubCategory, s.sub_category)
        .with_dimension(Dimension::Region, s.region)
        .with_dimension(Dimension::State, s.state)
        .with_dimension(Dimension::ShipMode, s.ship_mode)
        .with_dimension(Dimension::Segment, s.segment)
        .with_dimension(Dimension::CustomerName, s.customer)
        .with_sales(s.sales)
        .with_profit(s.profit)
        .with_discount(s.discount)
        .with_quantity(1)
}

/// A dozen lines spread over 2023 touching every dimension value at least
/// twice.
pub fn superstore() -> RecordSet {
    let rows = [
        ("O-1", date(2023, 1, 3), 4, "Furniture", "Chairs", "West", "California", "Standard Class", "Consumer", "Ann", 250.0, 30.0, 0.0),
        ("O-1", date(2023, 1, 3), 4, "Office Supplies", "Paper", "West", "California", "Standard Class", "Consumer", "Ann", 20.0, 6.0, 0.0),
        ("O-2", date(2023, 1, 19), 2, "Technology", "Phones", "East", "New York", "First Class", "Corporate", "Bob", 600.0, 120.0, 0.0),
        ("O-3", date(2023, 2, 7), 5, "Furniture", "Tables", "Central", "Texas", "Second Class", "Home Office", "Cy", 400.0, -80.0, 0.3),
        ("O-4", date(2023, 3, 1), 0, "Office Supplies", "Binders", "Central", "Texas", "Same Day", "Consumer", "Dee", 15.0, -12.0, 0.8),
        ("O-5", date(2023, 3, 14), 3, "Technology", "Accessories", "South", "Florida", "First Class", "Corporate", "Eve", 90.0, 20.0, 0.0),
        ("O-6", date(2023, 5, 22), 6, "Furniture", "Chairs", "East", "Ohio", "Standard Class", "Consumer", "Ann", 310.0, 25.0, 0.1),
        ("O-7", date(2023, 6, 30), 4, "Office Supplies", "Paper", "South", "Georgia", "Standard Class", "Home Office", "José", 35.0, 10.0, 0.0),
        ("O-8", date(2023, 8, 8), 1, "Technology", "Phones", "West", "Washington", "Same Day", "Corporate", "Bob", 720.0, -40.0, 0.2),
        ("O-9", date(2023, 9, 9), 5, "Furniture", "Tables", "South", "Florida", "Second Class", "Consumer", "Cy", 500.0, -150.0, 0.5),
        ("O-10", date(2023, 11, 11), 2, "Office Supplies", "Binders", "East", "New York", "Second Class", "Corporate", "Dee", 60.0, 15.0, 0.2),
        ("O-11", date(2023, 12, 31), 7, "Technology", "Accessories", "Central", "Illinois", "Standard Class", "Home Office", "Eve", 130.0, 33.0, 0.0),
    ];
    let lines = rows
        .iter()
        .map(|&(id, ordered, shipped_after, category, sub_category, region, state, ship_mode, segment, customer, sales, profit, discount)| {
            line(&Spec {
                id,
                ordered,
                shipped_after,
                category,
                sub_category,
                region,
                state,
                ship_mode,
                segment,
                customer,
                sales,
                profit,
                discount,
            })
        })
        .collect();
    RecordSet::from_lines(lines)
}

pub fn total_sales(set: &RecordSet) -> f64 {
    set.iter().map(|l| l.sales).sum()
}

pub const CSV_HEADER: &str = "Row ID,Order ID,Order Date,Ship Date,Ship Mode,Customer ID,Customer Name,Segment,Country,City,State,Postal Code,Region,Product ID,Category,Sub-Category,Product Name,Sales,Quantity,Discount,Profit";
