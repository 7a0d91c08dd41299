/// Fixed-size ring buffer mean. Samples before the buffer has
/// filled count as zeros in the average rather than shrinking the
/// divisor, matching the original's "buffered" semantics.
#[derive(Debug, Clone)]
pub struct MeanBuffer {
    samples: Vec<f64>,
    next: usize,
    filled: usize,
}

impl MeanBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "MeanBuffer capacity must be positive");
        Self {
            samples: vec![0.0; capacity],
            next: 0,
            filled: 0,
        }
    }

    pub fn register(&mut self, value: f64) {
        self.samples[self.next] = value;
        self.next = (self.next + 1) % self.samples.len();
        self.filled = (self.filled + 1).min(self.samples.len());
    }

    pub fn mean(&self) -> f64 {
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn is_filled(&self) -> bool {
        self.filled == self.samples.len()
    }
}
