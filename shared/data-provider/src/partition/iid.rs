use netfl_core::deterministic_rng;
use rand::seq::SliceRandom;

/// The first `len % num_partitions` chunks get one extra example.
pub(super) fn assign(len: usize, num_partitions: usize, seed: u64) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(&mut deterministic_rng(seed, 0));

    let base = len / num_partitions;
    let extra = len % num_partitions;
    let mut partitions = Vec::with_capacity(num_partitions);
    let mut start = 0;
    for i in 0..num_partitions {
        let size = base + usize::from(i < extra);
        partitions.push(indices[start..start + size].to_vec());
        start += size;
    }
    partitions
}
