use crate::NodeId;
use serde::{Deserialize, Serialize};

/// Emulated link characteristics. Built fresh for every link; never shared.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkParams {
    /// Mbit/s.
    pub bandwidth: f64,
    #[serde(default)]
    pub delay_ms: u64,
    /// Packet loss percentage, 0..=100.
    #[serde(default)]
    pub loss: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_size: Option<u32>,
}

impl LinkParams {
    pub fn new(bandwidth: f64) -> Self {
        Self {
            bandwidth,
            delay_ms: 0,
            loss: 0.0,
            queue_size: None,
        }
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_loss(mut self, loss: f64) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_queue_size(mut self, queue_size: u32) -> Self {
        self.queue_size = Some(queue_size);
        self
    }

    pub(crate) fn problem(&self) -> Option<String> {
        if !(self.bandwidth.is_finite() && self.bandwidth > 0.0) {
            return Some(format!("bandwidth must be positive, got {}", self.bandwidth));
        }
        if !(0.0..=100.0).contains(&self.loss) {
            return Some(format!("loss must be within 0..=100, got {}", self.loss));
        }
        None
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub endpoint_a: NodeId,
    pub endpoint_b: NodeId,
    #[serde(flatten)]
    pub params: LinkParams,
}
