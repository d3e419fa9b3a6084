// Domain models: raw runtime counters, derived metrics, container projections

mod container;
mod metrics;
mod sample;

pub use container::{ContainerDetails, ContainerState, ContainerSummary};
pub use metrics::DerivedMetrics;
pub use sample::{InterfaceCounters, RawStatsSample};
