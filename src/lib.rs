#![deny(dead_code)]
#![deny(unused_imports)]

pub mod eigen;
pub mod linalg;
pub mod lmi;
pub mod packed;
pub mod pencil;
pub mod types;

pub use eigen::{DenseEigenOracle, ExtremalEigenOracle};
pub use lmi::{Lmi, LmiError};
pub use packed::PackedTriangle;
pub use pencil::MatrixPencil;
pub use types::{EvaluationStrategy, LmiOptions};
