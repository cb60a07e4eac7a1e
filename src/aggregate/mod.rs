//! Weighted aggregation of the cleaned survey table.
//!
//! [`grouping`] is the generic group-by engine; [`batch`] declares the
//! weighted aggregates persisted by the pipeline and [`live`] the shapes the
//! web server recomputes on request. Both go through the same engine.

pub mod batch;
pub mod grouping;
pub mod live;
pub mod stats;

pub use grouping::{
    AggregateRow, AggregateTable, GroupSpec, Metric, MetricKind, SortOrder, aggregate,
};
