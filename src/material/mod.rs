//! Implements the return-mapping algorithms and sample plasticity models

mod drucker_prager_cap;
mod isotropic_plasticity;
mod material_point_state;
mod multi_parameter;
mod multi_surface_model;
mod power_law_creep;
mod radial_return;
mod return_map_error;
mod scalar_return_map;
mod settings;
mod smoother;
mod yield_and_flow;
pub use crate::material::drucker_prager_cap::*;
pub use crate::material::isotropic_plasticity::*;
pub use crate::material::material_point_state::*;
pub use crate::material::multi_parameter::*;
pub use crate::material::multi_surface_model::*;
pub use crate::material::power_law_creep::*;
pub use crate::material::radial_return::*;
pub use crate::material::return_map_error::*;
pub use crate::material::scalar_return_map::*;
pub use crate::material::settings::*;
pub use crate::material::smoother::*;
pub use crate::material::yield_and_flow::*;
