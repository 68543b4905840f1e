use serde::{Deserialize, Serialize};

/// How `Σ x_i·A_i` is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EvaluationStrategy {
    /// Packed upper triangles: one `(m(m+1)/2) × d` product, then a mirror pass.
    #[default]
    Packed,
    /// Plain weighted sum of full matrices. Reference path.
    Naive,
}

pub fn default_symmetry_rel_tol() -> f64 {
    1e-12
}

pub fn default_symmetry_abs_tol() -> f64 {
    1e-12
}

/// Construction and evaluation settings for a pencil.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LmiOptions {
    #[serde(default = "default_symmetry_rel_tol")]
    pub symmetry_rel_tol: f64,
    #[serde(default = "default_symmetry_abs_tol")]
    pub symmetry_abs_tol: f64,
    #[serde(default)]
    pub evaluation: EvaluationStrategy,
}

impl Default for LmiOptions {
    fn default() -> Self {
        Self {
            symmetry_rel_tol: default_symmetry_rel_tol(),
            symmetry_abs_tol: default_symmetry_abs_tol(),
            evaluation: EvaluationStrategy::default(),
        }
    }
}

impl LmiOptions {
    pub fn with_evaluation(mut self, evaluation: EvaluationStrategy) -> Self {
        self.evaluation = evaluation;
        self
    }
}
