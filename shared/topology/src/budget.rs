use serde::{Deserialize, Serialize};
use std::{fmt::Display, ops::Add};

// Compute units are fractional, so sums like 0.1 + 0.2 need a little slack.
const COMPUTE_EPSILON: f64 = 1e-9;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceBudget {
    pub compute_units: f64,
    pub memory_units: u64,
}

impl ResourceBudget {
    pub const ZERO: ResourceBudget = ResourceBudget {
        compute_units: 0.0,
        memory_units: 0,
    };

    pub fn new(compute_units: f64, memory_units: u64) -> Self {
        Self {
            compute_units,
            memory_units,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.compute_units.is_finite() && self.compute_units >= 0.0
    }

    pub fn fits_within(&self, capacity: &ResourceBudget) -> bool {
        self.compute_units <= capacity.compute_units + COMPUTE_EPSILON
            && self.memory_units <= capacity.memory_units
    }

    /// What is left of `self` once `used` is taken out, floored at zero.
    pub fn remaining_after(&self, used: &ResourceBudget) -> ResourceBudget {
        ResourceBudget {
            compute_units: (self.compute_units - used.compute_units).max(0.0),
            memory_units: self.memory_units.saturating_sub(used.memory_units),
        }
    }
}

impl Add for ResourceBudget {
    type Output = ResourceBudget;

    fn add(self, rhs: Self) -> Self::Output {
        ResourceBudget {
            compute_units: self.compute_units + rhs.compute_units,
            memory_units: self.memory_units + rhs.memory_units,
        }
    }
}

impl std::iter::Sum for ResourceBudget {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(ResourceBudget::ZERO, |acc, b| acc + b)
    }
}

impl Display for ResourceBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(cu={}, mu={})", self.compute_units, self.memory_units)
    }
}

/// Physical description of an emulated machine, relative to the host that runs the
/// emulation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HostProfile {
    pub cpus: u32,
    pub cpu_clock_ghz: f64,
    pub host_cpu_clock_ghz: f64,
    pub memory_mb: u64,
}

impl HostProfile {
    /// `cpus * cpu_clock / host_cpu_clock` compute units: a 4-core 1.2 GHz board on a
    /// 2.4 GHz host is worth two host cores.
    pub fn budget(&self) -> ResourceBudget {
        let compute_units = if self.host_cpu_clock_ghz > 0.0 {
            self.cpus as f64 * self.cpu_clock_ghz / self.host_cpu_clock_ghz
        } else {
            f64::NAN
        };
        ResourceBudget::new(compute_units, self.memory_mb)
    }
}

impl From<HostProfile> for ResourceBudget {
    fn from(profile: HostProfile) -> Self {
        profile.budget()
    }
}
