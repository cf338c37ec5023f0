//! The aggregate tables behind each dashboard panel.
//!
//! Every view is derived from the filtered lines only; nothing here looks at
//! the unfiltered set or keeps state between calls.

use serde::Serialize;

use super::aggregate::{
    group_by_fields, monthly, Aggregation, AggregationResult, Bucketing, KeyField, DISTINCT_ORDERS,
    PROFIT_MARGIN_PCT, SUM_PROFIT, SUM_SALES,
};
use super::model::{Dimension, Measure, OrderLine};

/// Panel sizes and bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    pub top_customers: usize,
    pub top_states: usize,
    pub bucketing: Bucketing,
}

impl Default for ViewOptions {
    fn default() -> Self {
        ViewOptions {
            top_customers: 10,
            top_states: 5,
            bucketing: Bucketing::Sparse,
        }
    }
}

/// All panel tables for one filter configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardViews {
    // -- Overview --
    pub monthly_trend: AggregationResult,
    pub sales_by_category: AggregationResult,
    pub sales_by_region: AggregationResult,
    pub orders_by_ship_mode: AggregationResult,
    pub processing_time_distribution: AggregationResult,

    // -- Sales analysis --
    pub sales_by_sub_category: AggregationResult,
    pub sales_by_ship_mode: AggregationResult,
    pub sales_by_segment: AggregationResult,
    pub top_customers: AggregationResult,
    pub top_states: AggregationResult,

    // -- Profit / loss analysis --
    pub profit_by_category_sub_category: AggregationResult,
    pub sub_category_performance: AggregationResult,
    pub profit_by_discount: AggregationResult,
    pub losses_by_category: AggregationResult,
    pub top_loss_states: AggregationResult,
}

const MEAN_PROCESSING_TIME: Aggregation = Aggregation::Mean(Measure::ProcessingTime);

fn by(dimension: Dimension) -> [KeyField; 1] {
    [KeyField::Dimension(dimension)]
}

/// Sales, profit and margin per value of `dimension`, largest sales first.
fn sales_profit_margin(lines: &[OrderLine], dimension: Dimension) -> AggregationResult {
    group_by_fields(lines, &by(dimension), &[SUM_SALES, SUM_PROFIT])
        .with_ratio(&PROFIT_MARGIN_PCT)
        .sorted_by(SUM_SALES, true)
}

fn sales_only(lines: &[OrderLine], dimension: Dimension) -> AggregationResult {
    group_by_fields(lines, &by(dimension), &[SUM_SALES]).sorted_by(SUM_SALES, true)
}

/// Build every panel table from the filtered lines.
pub fn build_views(lines: &[OrderLine], options: &ViewOptions) -> DashboardViews {
    // Loss panels sum profit over loss-making lines only, so their values
    // are negative and the largest loss sorts first ascending.
    let losses: Vec<OrderLine> = lines.iter().filter(|l| l.profit < 0.0).cloned().collect();

    DashboardViews {
        monthly_trend: monthly(lines, &[SUM_SALES, SUM_PROFIT], options.bucketing),
        sales_by_category: sales_profit_margin(lines, Dimension::Category),
        sales_by_region: sales_profit_margin(lines, Dimension::Region),
        orders_by_ship_mode: group_by_fields(
            lines,
            &by(Dimension::ShipMode),
            &[DISTINCT_ORDERS, MEAN_PROCESSING_TIME],
        )
        .sorted_by(DISTINCT_ORDERS, true),
        processing_time_distribution: group_by_fields(
            lines,
            &[KeyField::ProcessingTime],
            &[Aggregation::Count],
        )
        .sorted_by_key(),

        sales_by_sub_category: sales_only(lines, Dimension::SubCategory),
        sales_by_ship_mode: sales_only(lines, Dimension::ShipMode),
        sales_by_segment: sales_only(lines, Dimension::Segment),
        top_customers: group_by_fields(
            lines,
            &by(Dimension::CustomerName),
            &[SUM_SALES, SUM_PROFIT],
        )
        .top(SUM_SALES, options.top_customers),
        top_states: sales_profit_margin(lines, Dimension::State).top(SUM_SALES, options.top_states),

        profit_by_category_sub_category: group_by_fields(
            lines,
            &[
                KeyField::Dimension(Dimension::Category),
                KeyField::Dimension(Dimension::SubCategory),
            ],
            &[SUM_PROFIT],
        )
        .sorted_by(SUM_PROFIT, false),
        sub_category_performance: group_by_fields(
            lines,
            &by(Dimension::SubCategory),
            &[SUM_SALES, SUM_PROFIT, Aggregation::Sum(Measure::Quantity)],
        ),
        profit_by_discount: group_by_fields(
            lines,
            &[KeyField::Discount],
            &[Aggregation::Mean(Measure::Profit), Aggregation::Mean(Measure::Sales)],
        )
        .sorted_by_key(),
        losses_by_category: group_by_fields(&losses, &by(Dimension::Category), &[SUM_PROFIT])
            .sorted_by(SUM_PROFIT, false),
        top_loss_states: group_by_fields(&losses, &by(Dimension::State), &[SUM_PROFIT])
            .sorted_by(SUM_PROFIT, false)
            .head(options.top_states),
    }
}
