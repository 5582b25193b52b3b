//! Return-mapping algorithms for rate-independent multi-surface plasticity
//!
//! The crate provides a generalized Newton-Raphson return-map over an arbitrary
//! number of smoothed yield surfaces ([material::MultiParameterReturnMap]), a
//! robust scalar solver for single-variable return maps
//! ([material::ScalarReturnMapSolver]) and a small tensor layer in the Mandel basis.

/// Defines a type alias for the error type as a static string
pub type StrError = &'static str;

pub mod material;
pub mod prelude;
pub mod tensor;
