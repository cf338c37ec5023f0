//! # superstore-dash
//!
//! Filter-and-aggregate pipeline behind a retail sales dashboard.
//!
//! A flat table of order lines is loaded once ([`data::loader`]), narrowed by
//! an explicit [`FilterSpec`] ([`data::filter`]) and summarised into KPIs
//! ([`data::kpi`]) and one aggregate table per dashboard panel
//! ([`data::views`]). Rendering and filter widgets live elsewhere.

#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;

pub use cache::{DatasetCache, LoadedDataset, ResultCache};
pub use config::Config;
pub use data::aggregate::{group_by, group_by_fields, monthly, Aggregation, AggregationResult, Bucketing, KeyField};
pub use data::filter::{apply, filtered_indices, FilterSpec};
pub use data::kpi::{compute_kpis, Kpis};
pub use data::loader::{load_bytes, load_file, load_file_with, LoadOptions};
pub use data::model::{Dimension, Measure, OrderLine, Ratio, RecordSet};
pub use error::LoadError;
pub use pipeline::{Evaluation, Pipeline, Session};
