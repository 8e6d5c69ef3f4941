use netfl_core::ClientId;
use std::{collections::HashMap, time::Instant};

/// Time a client spends between handing back an update and receiving the next
/// round's parameters, tracked per client.
#[derive(Debug, Default)]
pub struct ExchangeTimer {
    last_send: HashMap<ClientId, Instant>,
}

impl ExchangeTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_send(&mut self, client_id: ClientId) {
        self.record_send_at(client_id, Instant::now());
    }

    pub fn record_send_at(&mut self, client_id: ClientId, at: Instant) {
        self.last_send.insert(client_id, at);
    }

    /// Seconds since `client_id` last sent, or `None` if it never has.
    pub fn on_receive(&self, client_id: ClientId) -> Option<f64> {
        self.on_receive_at(client_id, Instant::now())
    }

    pub fn on_receive_at(&self, client_id: ClientId, at: Instant) -> Option<f64> {
        self.last_send
            .get(&client_id)
            .map(|sent| at.saturating_duration_since(*sent).as_secs_f64())
    }
}
