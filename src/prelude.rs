//! Makes available common structures needed to run a return-map
//!
//! You may write `use retmap::prelude::*` in your code and obtain
//! access to commonly used functionality.

pub use crate::material::{DruckerPragerCap, DruckerPragerCapParams, IsotropicPlasticity, PowerLawCreep};
pub use crate::material::{MaterialPointState, MultiParameterReturnMap, MultiSurfaceModel, ReturnMapError};
pub use crate::material::{RadialReturn, RadialReturnModel, RadialReturnState};
pub use crate::material::{ReturnMapSettings, ScalarReturnMap, ScalarReturnMapSettings, ScalarReturnMapSolver};
pub use crate::material::{SmootherFunction, StressUpdate, YieldAndFlow, YieldSurfaceSmoother};
pub use crate::tensor::{LinElasticity, Tensor2, Tensor4};
pub use crate::StrError;
