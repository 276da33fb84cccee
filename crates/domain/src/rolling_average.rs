//! Fixed-window rolling average.

/// Average of the last `N` samples. The oldest sample is evicted once full.
#[derive(Debug, Clone)]
pub struct RollingAverage<const N: usize> {
    samples: [f32; N],
    head: usize,
    count: usize,
    sum: f32,
}

impl<const N: usize> Default for RollingAverage<N> {
    fn default() -> Self {
        Self {
            samples: [0.0; N],
            head: 0,
            count: 0,
            sum: 0.0,
        }
    }
}

impl<const N: usize> RollingAverage<N> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f32) {
        if N == 0 {
            return;
        }
        if self.count == N {
            self.sum -= self.samples[self.head];
        } else {
            self.count += 1;
        }
        self.samples[self.head] = value;
        self.sum += value;
        self.head = (self.head + 1) % N;
    }

    /// Mean of the held samples, `0.0` when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average(&self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f32
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.count == N
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
