//! Analytics harvesting: the recurring snapshot engine and its scheduler,
//! day-over-day delta calculation, and the on-demand insight readers.

pub mod deltas;
pub mod engine;
pub mod media;
pub mod overview;
pub mod scheduler;

pub use deltas::DeltaCalculator;
pub use engine::{SnapshotEngine, TickStats};
pub use media::{MediaInsightsService, MediaSummary};
pub use overview::{AccountOverview, OverviewService, SeriesPoint};
pub use scheduler::{SchedulerHandle, SnapshotScheduler};
