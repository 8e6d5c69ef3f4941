use crate::InstrumentationError;
use netfl_core::RunningAverage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use sysinfo::{get_current_pid, Pid, ProcessesToUpdate, System};
use tokio::{
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu_percent: f64,
    pub memory_bytes: f64,
}

/// A single reading of CPU and memory usage. `None` means the reading could not be
/// taken and is skipped.
pub trait ResourceProbe: Send + 'static {
    fn sample(&mut self) -> Option<ResourceUsage>;
}

/// Reads the current process's CPU utilisation and resident set size.
pub struct SysinfoProbe {
    system: System,
    pid: Pid,
}

impl SysinfoProbe {
    pub fn new() -> Result<Self, InstrumentationError> {
        let pid = get_current_pid()
            .map_err(|e| InstrumentationError::ProbeUnavailable(e.to_string()))?;
        let mut system = System::new();
        // cpu usage is computed against the previous refresh
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        Ok(Self { system, pid })
    }
}

impl ResourceProbe for SysinfoProbe {
    fn sample(&mut self) -> Option<ResourceUsage> {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        self.system.process(self.pid).map(|process| ResourceUsage {
            cpu_percent: process.cpu_usage() as f64,
            memory_bytes: process.memory() as f64,
        })
    }
}

enum SamplerState<P> {
    Idle(P),
    Sampling {
        cancel: CancellationToken,
        task: JoinHandle<(P, Vec<ResourceUsage>)>,
    },
    Lost,
}

/// Samples a [`ResourceProbe`] on a background task at a fixed interval between
/// [`start`](Self::start) and [`stop`](Self::stop). Only one sampling run at a time.
pub struct ResourceSampler<P: ResourceProbe> {
    period: Duration,
    state: SamplerState<P>,
}

impl<P: ResourceProbe> ResourceSampler<P> {
    pub fn new(probe: P, period: Duration) -> Self {
        Self {
            period,
            state: SamplerState::Idle(probe),
        }
    }

    pub fn is_sampling(&self) -> bool {
        matches!(self.state, SamplerState::Sampling { .. })
    }

    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<(), InstrumentationError> {
        let mut probe = match std::mem::replace(&mut self.state, SamplerState::Lost) {
            SamplerState::Idle(probe) => probe,
            running @ SamplerState::Sampling { .. } => {
                self.state = running;
                return Err(InstrumentationError::AlreadySampling);
            }
            SamplerState::Lost => return Err(InstrumentationError::ProbeLost),
        };

        let cancel = CancellationToken::new();
        let period = self.period;
        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let mut samples = Vec::new();
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            match probe.sample() {
                                Some(usage) => samples.push(usage),
                                None => trace!("Resource probe returned no reading"),
                            }
                        }
                    }
                }
                (probe, samples)
            }
        });
        debug!(period_ms = period.as_millis() as u64, "Started resource sampler");
        self.state = SamplerState::Sampling { cancel, task };
        Ok(())
    }

    /// Cancels the sampling task, waits for it to finish and returns the mean of
    /// everything it collected (all zeros if nothing was collected).
    pub async fn stop(&mut self) -> Result<ResourceUsage, InstrumentationError> {
        let (cancel, task) = match std::mem::replace(&mut self.state, SamplerState::Lost) {
            SamplerState::Sampling { cancel, task } => (cancel, task),
            other => {
                self.state = other;
                return Err(InstrumentationError::NotSampling);
            }
        };

        cancel.cancel();
        let (probe, samples) = match task.await {
            Ok(done) => done,
            Err(err) => {
                warn!("Resource sampler task failed: {err}");
                return Err(err.into());
            }
        };
        self.state = SamplerState::Idle(probe);

        let cpu: RunningAverage = samples.iter().map(|s| s.cpu_percent).collect();
        let memory: RunningAverage = samples.iter().map(|s| s.memory_bytes).collect();
        debug!(samples = samples.len(), "Stopped resource sampler");
        Ok(ResourceUsage {
            cpu_percent: cpu.mean(),
            memory_bytes: memory.mean(),
        })
    }
}
