mod duration;
mod error;
mod exchange;
mod records;
mod report;
mod sampler;

pub use duration::{measure_duration, measure_duration_async};
pub use error::InstrumentationError;
pub use exchange::ExchangeTimer;
pub use records::{ClientEvaluateMetrics, EvaluateMetrics, FitMetrics};
pub use report::{MetricsReport, RoundReport};
pub use sampler::{ResourceProbe, ResourceSampler, ResourceUsage, SysinfoProbe};
