//! Implements second- and fourth-order symmetric tensors in the Mandel basis
//!
//! A symmetric second-order tensor `σ` is stored as the 6-vector
//!
//! ```text
//! [σ00, σ11, σ22, √2 σ01, √2 σ12, √2 σ02]
//! ```
//!
//! and a fourth-order tensor with minor symmetries as a 6×6 matrix, such that
//! `A : x` becomes a matrix-vector product and `A : B` a matrix-matrix product.

mod constants;
mod lin_elasticity;
mod tensor2;
mod tensor4;
pub use crate::tensor::constants::*;
pub use crate::tensor::lin_elasticity::*;
pub use crate::tensor::tensor2::*;
pub use crate::tensor::tensor4::*;
