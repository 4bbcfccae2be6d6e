//! Binary classifiers used to refit on reweighed data.
//!
//! The [`Classifier`] trait is the narrow contract the audit driver depends
//! on. [`LogisticRegression`] is the built-in implementation: an
//! L2-regularised, instance-weighted logistic model with a deterministic
//! Newton solver and a seeded stochastic-gradient alternative.

use crate::error::FairnessError;
use crate::preprocessing::check_matrix;
use ndarray::{Array1, Array2, ArrayView2, Axis, concatenate, s};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Minimal contract for a model the audit can fit and query.
pub trait Classifier {
    /// Fit on a `records x features` matrix and one label per record.
    /// `weights`, when given, has one entry per record.
    fn fit(
        &mut self,
        features: ArrayView2<'_, f64>,
        labels: &[f64],
        weights: Option<&[f64]>,
    ) -> Result<(), FairnessError>;

    /// Probability of the larger of the two label values.
    fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, FairnessError>;

    /// Predicted labels, using the label values seen during `fit`.
    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, FairnessError>;

    /// Whether `fit` honours instance weights.
    fn supports_sample_weight(&self) -> bool {
        true
    }

    /// Human readable model name for logs and reports.
    fn name(&self) -> &str {
        "classifier"
    }
}

/// Optimisation method for [`LogisticRegression`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Solver {
    /// Damped Newton iterations with backtracking; deterministic.
    #[default]
    Newton,
    /// Shuffled stochastic gradient descent driven by the seed.
    Sgd,
}

/// Hyper-parameters for [`LogisticRegression`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegressionConfig {
    /// Inverse regularisation strength.
    #[serde(default = "default_c")]
    pub c: f64,
    #[serde(default = "default_true")]
    pub fit_intercept: bool,
    /// Newton iterations or SGD epochs.
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default = "default_tol")]
    pub tol: f64,
    #[serde(default)]
    pub solver: Solver,
    /// Initial SGD step size; unused by Newton.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

impl Default for LogisticRegressionConfig {
    fn default() -> Self {
        Self {
            c: default_c(),
            fit_intercept: true,
            max_iter: default_max_iter(),
            tol: default_tol(),
            solver: Solver::default(),
            learning_rate: default_learning_rate(),
        }
    }
}

fn default_c() -> f64 {
    1.0
}
fn default_true() -> bool {
    true
}
fn default_max_iter() -> usize {
    100
}
fn default_tol() -> f64 {
    1e-6
}
fn default_learning_rate() -> f64 {
    0.1
}

/// Learned parameters of a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedLogistic {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
    /// `[negative, positive]` label values.
    pub classes: [f64; 2],
    pub n_iter: usize,
    pub converged: bool,
}

/// L2-regularised weighted logistic regression.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    config: LogisticRegressionConfig,
    seed: u64,
    fitted: Option<FittedLogistic>,
}

struct Problem {
    /// Features, plus a trailing column of ones when fitting an intercept.
    design: Array2<f64>,
    y: Array1<f64>,
    w: Array1<f64>,
    /// 1.0 for coefficients, 0.0 for the intercept.
    penalized: Array1<f64>,
    c: f64,
    width: usize,
    fit_intercept: bool,
}

impl Problem {
    fn num_params(&self) -> usize {
        self.design.ncols()
    }

    fn objective(&self, beta: &Array1<f64>) -> f64 {
        let eta = self.design.dot(beta);
        let loss: f64 = eta
            .iter()
            .zip(self.y.iter().zip(&self.w))
            .map(|(eta, (y, w))| w * (softplus(*eta) - y * eta))
            .sum();
        self.c * loss + 0.5 * (beta * beta * &self.penalized).sum()
    }

    /// Gradient and Hessian of the objective at `beta`.
    fn derivatives(&self, beta: &Array1<f64>) -> (Array1<f64>, Array2<f64>) {
        let mu = self.design.dot(beta).mapv_into(sigmoid);
        let residual = (&mu - &self.y) * &self.w * self.c;
        let curvature = mu.mapv(|m| m * (1.0 - m)) * &self.w * self.c;

        let grad = self.design.t().dot(&residual) + &self.penalized * beta;
        let scaled = &self.design * &curvature.insert_axis(Axis(1));
        let hess = self.design.t().dot(&scaled) + Array2::from_diag(&self.penalized);
        (grad, hess)
    }
}

impl LogisticRegression {
    pub fn new(config: LogisticRegressionConfig, seed: u64) -> Self {
        Self {
            config,
            seed,
            fitted: None,
        }
    }

    pub fn config(&self) -> &LogisticRegressionConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn fitted(&self) -> Option<&FittedLogistic> {
        self.fitted.as_ref()
    }

    fn model(&self) -> Result<&FittedLogistic, FairnessError> {
        self.fitted
            .as_ref()
            .ok_or_else(|| FairnessError::fit_failure("model is not fitted"))
    }

    fn prepare(
        &self,
        features: ArrayView2<'_, f64>,
        labels: &[f64],
        weights: Option<&[f64]>,
    ) -> Result<(Problem, [f64; 2]), FairnessError> {
        if !(self.config.c.is_finite() && self.config.c > 0.0) {
            return Err(FairnessError::fit_failure(format!(
                "regularisation C must be positive, got {}",
                self.config.c
            )));
        }
        let width = check_matrix(features).map_err(|e| FairnessError::fit_failure(e.to_string()))?;
        let n = features.nrows();
        if labels.len() != n {
            return Err(FairnessError::fit_failure(format!(
                "{n} feature rows but {} labels",
                labels.len()
            )));
        }
        if features.iter().any(|v| !v.is_finite()) {
            return Err(FairnessError::fit_failure("features contain non-finite values"));
        }

        let mut classes: Vec<f64> = Vec::new();
        for &label in labels {
            if !label.is_finite() {
                return Err(FairnessError::fit_failure("labels contain non-finite values"));
            }
            if !classes.contains(&label) {
                classes.push(label);
            }
        }
        if classes.len() != 2 {
            return Err(FairnessError::fit_failure(format!(
                "needs samples of exactly two classes, found {}",
                classes.len()
            )));
        }
        classes.sort_by(f64::total_cmp);
        let classes = [classes[0], classes[1]];

        let w = match weights {
            Some(w) if w.len() != n => {
                return Err(FairnessError::fit_failure(format!(
                    "{n} records but {} weights",
                    w.len()
                )));
            }
            Some(w) => Array1::from(w.to_vec()),
            None => Array1::ones(n),
        };
        if w.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(FairnessError::fit_failure("weights must be finite and non-negative"));
        }
        if w.sum() <= 0.0 {
            return Err(FairnessError::fit_failure("all instance weights are zero"));
        }

        let fit_intercept = self.config.fit_intercept;
        let design = if fit_intercept {
            let ones = Array2::<f64>::ones((n, 1));
            concatenate(Axis(1), &[features.view(), ones.view()])
                .map_err(|e| FairnessError::fit_failure(e.to_string()))?
        } else {
            features.to_owned()
        };
        let penalized = Array1::from_shape_fn(design.ncols(), |j| if j < width { 1.0 } else { 0.0 });
        let y = labels
            .iter()
            .map(|&l| if l == classes[1] { 1.0 } else { 0.0 })
            .collect();
        Ok((
            Problem {
                design,
                y,
                w,
                penalized,
                c: self.config.c,
                width,
                fit_intercept,
            },
            classes,
        ))
    }

    fn solve_newton(&self, problem: &Problem) -> Result<(Array1<f64>, usize, bool), FairnessError> {
        let mut beta = Array1::zeros(problem.num_params());
        for iter in 1..=self.config.max_iter {
            let (grad, hess) = problem.derivatives(&beta);
            let step = solve_linear(hess, grad.clone()).ok_or_else(|| {
                FairnessError::fit_failure(format!("singular Hessian at iteration {iter}"))
            })?;

            let current = problem.objective(&beta);
            let slope = grad.dot(&step);
            let mut t = 1.0;
            let mut candidate = shifted(&beta, &step, t);
            for _ in 0..50 {
                if problem.objective(&candidate) <= current - 1e-4 * t * slope {
                    break;
                }
                t *= 0.5;
                candidate = shifted(&beta, &step, t);
            }
            if candidate.iter().any(|b| !b.is_finite()) {
                return Err(FairnessError::fit_failure(format!(
                    "non-finite coefficients at iteration {iter}"
                )));
            }

            let change = step.iter().map(|s| (t * s).abs()).fold(0.0, f64::max);
            beta = candidate;
            debug!(iter, change, objective = current, "Newton step");
            if change < self.config.tol {
                return Ok((beta, iter, true));
            }
        }
        Ok((beta, self.config.max_iter, false))
    }

    fn solve_sgd(&self, problem: &Problem) -> Result<(Array1<f64>, usize, bool), FairnessError> {
        let n = problem.design.nrows();
        let total_weight = problem.w.sum();
        let mean_weight = total_weight / n as f64;
        let reg = 1.0 / (problem.c * total_weight);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..n).collect();
        let mut beta = Array1::zeros(problem.num_params());

        for epoch in 0..self.config.max_iter {
            order.shuffle(&mut rng);
            let lr = self.config.learning_rate / (1.0 + epoch as f64).sqrt();
            let before = beta.clone();
            for &i in &order {
                let row = problem.design.row(i);
                let residual =
                    (problem.w[i] / mean_weight) * (sigmoid(row.dot(&beta)) - problem.y[i]);
                let mut grad = row.mapv(|x| x * residual);
                grad.scaled_add(reg, &(&problem.penalized * &beta));
                beta.scaled_add(-lr, &grad);
            }
            if beta.iter().any(|b| !b.is_finite()) {
                return Err(FairnessError::fit_failure(format!(
                    "non-finite coefficients in epoch {epoch}"
                )));
            }
            let change = (&beta - &before)
                .iter()
                .map(|d| d.abs())
                .fold(0.0, f64::max);
            debug!(epoch, change, "SGD epoch");
            if change < self.config.tol {
                return Ok((beta, epoch + 1, true));
            }
        }
        Ok((beta, self.config.max_iter, false))
    }
}

impl Classifier for LogisticRegression {
    fn fit(
        &mut self,
        features: ArrayView2<'_, f64>,
        labels: &[f64],
        weights: Option<&[f64]>,
    ) -> Result<(), FairnessError> {
        let (problem, classes) = self.prepare(features, labels, weights)?;
        let (beta, n_iter, converged) = match self.config.solver {
            Solver::Newton => self.solve_newton(&problem)?,
            Solver::Sgd => self.solve_sgd(&problem)?,
        };
        if !converged {
            warn!(
                solver = ?self.config.solver,
                max_iter = self.config.max_iter,
                "Logistic regression did not converge; increase max_iter"
            );
        }

        let intercept = if problem.fit_intercept {
            beta[problem.width]
        } else {
            0.0
        };
        self.fitted = Some(FittedLogistic {
            coefficients: beta.slice(s![..problem.width]).to_owned(),
            intercept,
            classes,
            n_iter,
            converged,
        });
        Ok(())
    }

    fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, FairnessError> {
        let model = self.model()?;
        let width = check_matrix(features)?;
        if width != model.coefficients.len() {
            return Err(FairnessError::invalid_input(format!(
                "model was fitted on {} features, got {width}",
                model.coefficients.len()
            )));
        }
        Ok((features.dot(&model.coefficients) + model.intercept).mapv_into(sigmoid))
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, FairnessError> {
        let [negative, positive] = self.model()?.classes;
        Ok(self
            .predict_proba(features)?
            .mapv_into(|p| if p > 0.5 { positive } else { negative }))
    }

    fn name(&self) -> &str {
        "logistic_regression"
    }
}

fn sigmoid(eta: f64) -> f64 {
    if eta >= 0.0 {
        1.0 / (1.0 + (-eta).exp())
    } else {
        let e = eta.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^eta)` without overflow.
fn softplus(eta: f64) -> f64 {
    if eta > 0.0 {
        eta + (-eta).exp().ln_1p()
    } else {
        eta.exp().ln_1p()
    }
}

fn shifted(beta: &Array1<f64>, step: &Array1<f64>, t: f64) -> Array1<f64> {
    let mut next = beta.clone();
    next.scaled_add(-t, step);
    next
}

/// Gaussian elimination with partial pivoting. `None` when the matrix is singular.
fn solve_linear(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    let scale = a.iter().map(|v| v.abs()).fold(0.0, f64::max).max(1.0);
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() <= 1e-12 * scale {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        let pivot_row = a.row(col).to_owned();
        for row in col + 1..n {
            let factor = a[[row, col]] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            a.row_mut(row).scaled_add(-factor, &pivot_row);
            b[row] -= factor * b[col];
        }
    }
    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail = a.slice(s![row, row + 1..]).dot(&x.slice(s![row + 1..]));
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(x)
}
