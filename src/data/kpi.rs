use std::collections::HashSet;

use serde::Serialize;

use super::model::{OrderLine, Ratio};

/// Headline figures shown above the dashboard panels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Kpis {
    pub total_sales: f64,
    pub total_profit: f64,
    /// `total_profit / total_sales × 100`; undefined when there are no sales.
    pub avg_margin_pct: Ratio,
    /// Sum of `|profit|` over loss-making lines.
    pub total_losses: f64,
    /// Distinct order ids.
    pub total_orders: usize,
}

/// Compute the KPIs of a (typically filtered) set of lines. Total over any
/// input: the empty set gives zeros and an undefined margin.
pub fn compute_kpis<'a, I>(lines: I) -> Kpis
where
    I: IntoIterator<Item = &'a OrderLine>,
{
    let mut total_sales = 0.0;
    let mut total_profit = 0.0;
    let mut total_losses = 0.0;
    let mut orders: HashSet<&str> = HashSet::new();

    for line in lines {
        total_sales += line.sales;
        total_profit += line.profit;
        if line.profit < 0.0 {
            total_losses += line.profit.abs();
        }
        orders.insert(line.order_id.as_str());
    }

    Kpis {
        total_sales,
        total_profit,
        avg_margin_pct: Ratio::percent(total_profit, total_sales),
        total_losses,
        total_orders: orders.len(),
    }
}
