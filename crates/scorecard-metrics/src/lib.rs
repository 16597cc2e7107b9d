// Gauge series for scorecard data, plus the endpoint that serves them
// Keeps the exposed state in one place so retiring a target is exact

pub mod error;
pub mod server;
pub mod store;

pub use error::MetricsError;
pub use server::{MetricsServer, ServerConfig};
pub use store::{CheckSample, MetricStore, ScoreSample, DEFAULT_NAMESPACE};

pub type Result<T> = std::result::Result<T, MetricsError>;
