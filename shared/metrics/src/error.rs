use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstrumentationError {
    #[error("resource sampler is already running")]
    AlreadySampling,

    #[error("resource sampler is not running")]
    NotSampling,

    #[error("resource sampler task failed: {0}")]
    SamplerTaskFailed(#[from] tokio::task::JoinError),

    #[error("resource sampler lost its probe after a failed sampling task")]
    ProbeLost,

    #[error("resource probe unavailable: {0}")]
    ProbeUnavailable(String),

    #[error("failed to write metrics report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize metrics report: {0}")]
    Serialize(#[from] serde_json::Error),
}
