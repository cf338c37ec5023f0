//! Data layer: core types, loading, filtering and aggregation.
//!
//! Architecture:
//! ```text
//!  .csv / .json / .parquet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file → RecordSet (dates, processing time)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ RecordSet │  Vec<OrderLine>, domain per dimension
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  FilterSpec → filtered subset
//!   └──────────┘
//!        │
//!        ├──────────────┐
//!        ▼              ▼
//!   ┌───────────┐  ┌──────┐
//!   │ aggregate │  │ kpi  │  group-by tables / headline figures
//!   └───────────┘  └──────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  views    │  one table per dashboard panel
//!   └──────────┘
//! ```

pub mod aggregate;
pub mod filter;
pub mod kpi;
pub mod loader;
pub mod model;
pub mod views;
