use ndarray::{Array1, Array2, Axis};
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::seq::SliceRandom;
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use serde::{Deserialize, Serialize};

use crate::error::{Co2Error, Result};
use crate::model::layers::{relu, relu_derivative};
use crate::model::Regressor;
use crate::training::history::TrainingHistory;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub hidden_size: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub lambda: f64,
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hidden_size: 16,
            epochs: 100,
            batch_size: 32,
            learning_rate: 0.001,
            lambda: 0.0001,
            seed: 42,
        }
    }
}

/// Dense network with one ReLU hidden layer and a single linear output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuralNetwork {
    pub weights1: Array2<f64>,
    pub bias1: Array2<f64>,
    pub weights2: Array2<f64>,
    pub bias2: Array2<f64>,
}

impl NeuralNetwork {
    pub fn new(input_size: usize, hidden_size: usize, rng: &mut StdRng) -> Self {
        let he_init = |size: usize| (2.0 / size as f64).sqrt();
        let weights1 = Array2::random_using(
            (input_size, hidden_size),
            Uniform::new(-he_init(input_size), he_init(input_size)),
            rng,
        );
        let bias1 = Array2::zeros((1, hidden_size));
        let weights2 = Array2::random_using(
            (hidden_size, 1),
            Uniform::new(-he_init(hidden_size), he_init(hidden_size)),
            rng,
        );
        let bias2 = Array2::zeros((1, 1));

        NeuralNetwork { weights1, bias1, weights2, bias2 }
    }

    pub fn input_size(&self) -> usize {
        self.weights1.nrows()
    }

    pub fn forward(&self, x: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        let hidden_input = x.dot(&self.weights1) + &self.bias1;
        let hidden_output = relu(&hidden_input);

        let output = hidden_output.dot(&self.weights2) + &self.bias2;

        (hidden_output, output)
    }

    /// One gradient step on mean squared error with L2 weight decay.
    pub fn train(&mut self, x: &Array2<f64>, y: &Array2<f64>, learning_rate: f64, lambda: f64) {
        let (hidden_output, output) = self.forward(x);
        let n = x.nrows() as f64;

        // Backpropagation
        let output_delta = (&output - y) * (2.0 / n);

        let hidden_error = output_delta.dot(&self.weights2.t());
        let hidden_delta = hidden_error * relu_derivative(&hidden_output);

        // Update weights and biases
        self.weights2 -= &(learning_rate * (hidden_output.t().dot(&output_delta) + lambda * &self.weights2));
        self.bias2 -= &(learning_rate * output_delta.sum_axis(Axis(0)).insert_axis(Axis(0)));

        self.weights1 -= &(learning_rate * (x.t().dot(&hidden_delta) + lambda * &self.weights1));
        self.bias1 -= &(learning_rate * hidden_delta.sum_axis(Axis(0)).insert_axis(Axis(0)));
    }

    pub fn loss(&self, y_true: &Array2<f64>, y_pred: &Array2<f64>) -> f64 {
        (y_pred - y_true).mapv(|e| e * e).mean().unwrap_or(f64::NAN)
    }

    /// Mini-batch gradient descent with a decaying learning rate.
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, config: &NetworkConfig) -> Result<(Self, TrainingHistory)> {
        if x.nrows() != y.len() {
            return Err(Co2Error::Shape {
                expected: format!("{} targets", x.nrows()),
                actual: format!("{}", y.len()),
            });
        }
        if x.nrows() == 0 {
            return Err(Co2Error::EmptyDataset);
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut nn = NeuralNetwork::new(x.ncols(), config.hidden_size, &mut rng);
        let mut history = TrainingHistory::default();
        let y = y.view().insert_axis(Axis(1)).to_owned();
        let batch_size = config.batch_size.max(1);
        let mut order: Vec<usize> = (0..x.nrows()).collect();

        tracing::info!(
            epochs = config.epochs,
            rows = x.nrows(),
            hidden = config.hidden_size,
            "training neural network"
        );

        for epoch in 0..config.epochs {
            let learning_rate = config.learning_rate * (1.0 / (1.0 + 0.01 * (epoch as f64)));
            order.shuffle(&mut rng);

            for batch in order.chunks(batch_size) {
                let xb = x.select(Axis(0), batch);
                let yb = y.select(Axis(0), batch);
                nn.train(&xb, &yb, learning_rate, config.lambda);
            }

            let (_, output) = nn.forward(x);
            let loss = nn.loss(&y, &output);
            let mae = (&output - &y).mapv(f64::abs).mean().unwrap_or(f64::NAN);
            history.record(epoch, loss, mae);

            if epoch % 10 == 0 || epoch + 1 == config.epochs {
                tracing::info!(epoch, loss, mae, "neural network progress");
            }
        }

        Ok((nn, history))
    }
}

impl Regressor for NeuralNetwork {
    fn n_features(&self) -> usize {
        self.input_size()
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_width(x)?;
        let (_, output) = self.forward(x);
        Ok(output.column(0).to_owned())
    }
}
