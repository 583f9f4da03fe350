//! The `granum_core` crate turns the microscopic state of a discrete-element
//! simulation (bodies, contacts, an optional periodic cell) into macroscopic
//! quantities, and offers a few in-place maintenance operations on that state.
//!
//! Key components:
//! - **Scene**: bodies, contacts, forces, the periodic `Cell` and registered drivers.
//! - **Tensors**: Love-Weber stress, capillary stress, fabric and their strong/weak splits.
//! - **Kinetics**: momentum, kinetic energy, unbalanced force and critical time steps.
//! - **Porosity**: analytic and voxel-sampled void fraction of sphere packings.
//! - **Flip**: lattice-preserving reduction of a sheared periodic cell.
//! - **Maintenance**: calming, particle growth, friction updates and explicit contacts.
pub mod error;
pub mod factory;
pub mod flip;
pub mod interaction;
pub mod kinetics;
pub mod lattice;
pub mod maintenance;
pub mod porosity;
pub mod scene;
pub mod tensors;
pub mod timestep;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
