mod client_id;
mod data_shuffle;
mod running_average;
mod timestamp;

pub use client_id::ClientId;
pub use data_shuffle::{deterministic_rng, deterministic_shuffle, Shuffle};
pub use running_average::RunningAverage;
pub use timestamp::Timestamp;
