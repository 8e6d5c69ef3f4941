use std::{future::Future, time::Instant};

/// Runs `operation` and returns its result along with the wall-clock seconds it took.
pub fn measure_duration<R>(operation: impl FnOnce() -> R) -> (R, f64) {
    let start = Instant::now();
    let result = operation();
    (result, start.elapsed().as_secs_f64())
}

pub async fn measure_duration_async<R>(operation: impl Future<Output = R>) -> (R, f64) {
    let start = Instant::now();
    let result = operation.await;
    (result, start.elapsed().as_secs_f64())
}
