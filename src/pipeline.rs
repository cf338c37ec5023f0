use std::sync::Arc;

use log::debug;

use crate::data::filter::{self, FilterSpec};
use crate::data::kpi::{compute_kpis, Kpis};
use crate::data::model::RecordSet;
use crate::data::views::{build_views, DashboardViews, ViewOptions};

// ---------------------------------------------------------------------------
// Pipeline: filter → KPIs + panel tables
// ---------------------------------------------------------------------------

/// Everything the presentation layer needs for one filter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub filtered: RecordSet,
    pub kpis: Kpis,
    pub views: DashboardViews,
}

/// Stateless filter-and-aggregate pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pipeline {
    options: ViewOptions,
}

impl Pipeline {
    pub fn new(options: ViewOptions) -> Self {
        Pipeline { options }
    }

    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    /// Full recomputation for `spec`. `records` is only read.
    pub fn evaluate(&self, records: &RecordSet, spec: &FilterSpec) -> Evaluation {
        let filtered = filter::apply(records, spec);
        debug!(
            "Filter kept {} of {} order lines",
            filtered.len(),
            records.len()
        );
        let kpis = compute_kpis(&filtered);
        let views = build_views(&filtered.lines, &self.options);
        Evaluation {
            filtered,
            kpis,
            views,
        }
    }
}

// ---------------------------------------------------------------------------
// Session: one dataset plus the current selection
// ---------------------------------------------------------------------------

/// Dashboard session state, independent of rendering.
pub struct Session {
    pipeline: Pipeline,

    /// Loaded dataset, shared read-only.
    dataset: Arc<RecordSet>,

    /// Current filter selection.
    spec: FilterSpec,

    /// Result for `spec` (recomputed on every change).
    current: Evaluation,
}

impl Session {
    /// Start a session with every filter fully selected.
    pub fn new(pipeline: Pipeline, dataset: Arc<RecordSet>) -> Self {
        let spec = FilterSpec::full(&dataset);
        let current = pipeline.evaluate(&dataset, &spec);
        Session {
            pipeline,
            dataset,
            spec,
            current,
        }
    }

    /// Swap in a reloaded dataset; filters reset to the new full domain.
    pub fn set_dataset(&mut self, dataset: Arc<RecordSet>) {
        self.dataset = dataset;
        self.spec = FilterSpec::full(&self.dataset);
        self.refilter();
    }

    /// Apply a new filter selection.
    pub fn set_filter(&mut self, spec: FilterSpec) -> &Evaluation {
        self.spec = spec;
        self.refilter();
        &self.current
    }

    fn refilter(&mut self) {
        self.current = self.pipeline.evaluate(&self.dataset, &self.spec);
    }

    pub fn dataset(&self) -> &Arc<RecordSet> {
        &self.dataset
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn evaluation(&self) -> &Evaluation {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::data::model::{Dimension, OrderLine};

    fn dataset() -> Arc<RecordSet> {
        let d = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        Arc::new(RecordSet::from_lines(vec![
            OrderLine::new("A", d, d)
                .with_dimension(Dimension::Segment, "Consumer")
                .with_sales(100.0)
                .with_profit(20.0),
            OrderLine::new("B", d, d)
                .with_dimension(Dimension::Segment, "Corporate")
                .with_sales(50.0)
                .with_profit(-10.0),
        ]))
    }

    #[test]
    fn session_starts_unfiltered() {
        let session = Session::new(Pipeline::default(), dataset());
        assert_eq!(session.evaluation().filtered.len(), 2);
        assert_eq!(session.evaluation().kpis.total_sales, 150.0);
    }

    #[test]
    fn set_filter_recomputes_everything() {
        let mut session = Session::new(Pipeline::default(), dataset());
        let spec = session.spec().clone().with_allowed(Dimension::Segment, ["Corporate"]);

        let evaluation = session.set_filter(spec);
        assert_eq!(evaluation.filtered.len(), 1);
        assert_eq!(evaluation.kpis.total_losses, 10.0);
        assert_eq!(evaluation.views.sales_by_segment.len(), 1);
        // The shared dataset is untouched.
        assert_eq!(session.dataset().len(), 2);
    }

    #[test]
    fn set_dataset_resets_filters() {
        let mut session = Session::new(Pipeline::default(), dataset());
        session.set_filter(FilterSpec::full(&dataset()).with_allowed(Dimension::Segment, Vec::<String>::new()));
        assert!(session.evaluation().filtered.is_empty());

        session.set_dataset(dataset());
        assert_eq!(session.evaluation().filtered.len(), 2);
    }
}
