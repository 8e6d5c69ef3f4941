use netfl_core::{deterministic_rng, ClientId};
use rand::seq::index::sample;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionPurpose {
    Fit = 0,
    Evaluate = 1,
}

/// Picks `max(⌊n · fraction⌋, min)` clients (at most `n`) out of `available`.
/// Seeded by `(seed, round, purpose)`; the result is sorted and independent of the
/// order `available` came in.
pub fn select_clients(
    available: &[ClientId],
    fraction: f64,
    min: usize,
    seed: u64,
    round: u32,
    purpose: SelectionPurpose,
) -> Vec<ClientId> {
    let mut population = available.to_vec();
    population.sort_unstable();
    population.dedup();

    let n = population.len();
    let size = ((n as f64 * fraction).floor() as usize).max(min).min(n);
    let mut rng = deterministic_rng(seed, ((round as u64) << 1) | purpose as u64);

    let mut selected: Vec<ClientId> = sample(&mut rng, n, size)
        .into_iter()
        .map(|i| population[i])
        .collect();
    selected.sort_unstable();
    selected
}
