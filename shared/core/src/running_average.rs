#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunningAverage {
    sum: f64,
    count: usize,
}

impl RunningAverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// 0 when nothing was pushed.
    pub fn mean(&self) -> f64 {
        match self.count {
            0 => 0.0,
            n => self.sum / n as f64,
        }
    }
}

impl FromIterator<f64> for RunningAverage {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut avg = Self::new();
        for value in iter {
            avg.push(value);
        }
        avg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mean_is_zero() {
        assert_eq!(RunningAverage::new().mean(), 0.0);
    }

    #[test]
    fn mean_of_values() {
        let avg: RunningAverage = [1.0, 2.0, 6.0].into_iter().collect();
        assert_eq!(avg.count(), 3);
        assert_eq!(avg.mean(), 3.0);
    }
}
