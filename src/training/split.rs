//! Seeded train/test split

use crate::error::{DatalensError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Row indices of a single train/test split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainTestSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

impl TrainTestSplit {
    /// Shuffle `0..n_samples` with a seeded generator and hold out `ceil(test_size * n)` rows.
    ///
    /// Both sides always keep at least one row.
    pub fn new(n_samples: usize, test_size: f64, seed: u64) -> Result<Self> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(DatalensError::InvalidParameter {
                name: "test_size".to_string(),
                value: test_size.to_string(),
                reason: "must be strictly between 0 and 1".to_string(),
            });
        }

        if n_samples < 2 {
            return Err(DatalensError::InsufficientData(format!(
                "need at least 2 rows to split, got {}",
                n_samples
            )));
        }

        // Tolerance keeps products like 0.2 * 35 from rounding up past an integer
        let n_test = ((test_size * n_samples as f64 - 1e-9).ceil() as usize).clamp(1, n_samples - 1);

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let train_indices = indices.split_off(n_test);
        Ok(Self {
            train_indices,
            test_indices: indices,
        })
    }
}
