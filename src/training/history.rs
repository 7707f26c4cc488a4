use serde::{Deserialize, Serialize};

/// Loss curve recorded while fitting a model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<usize>,
    pub losses: Vec<f64>,
    pub maes: Vec<f64>,
}

impl TrainingHistory {
    pub fn record(&mut self, epoch: usize, loss: f64, mae: f64) {
        self.epochs.push(epoch);
        self.losses.push(loss);
        self.maes.push(mae);
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.losses.last().copied()
    }
}
