//! # hydro-bem: BEM solver for linear potential-flow hydrodynamics
//!
//! Given a floating or submerged body mesh and a set of physical problems
//! (radiation at various frequencies and modes, diffraction under
//! incident waves, possibly with forward speed), this crate assembles
//! influence matrices from a Green's function, solves the resulting
//! linear systems, and derives forces, potentials, velocities, pressures
//! and free-surface elevations from the solution.
//!
//! ## Features
//!
//! - Direct and indirect boundary-integral formulations
//! - Batch resolution with per-problem failure isolation, sequentially
//!   or on a Rayon worker pool (`parallel` feature, on by default)
//! - Symbolic zero/infinite-frequency handling, so limiting cases flow
//!   through the ordinary solve path
//! - Mesh-resolution and irregular-frequency diagnostics
//! - Parameter sweeps assembled into added mass, radiation damping,
//!   excitation force and Kochin functions
//!
//! The Green's function and the matrix engine are injected at solver
//! construction; the built-in [`RankineGreenFunction`] and
//! [`BasicMatrixEngine`] are the defaults.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)] // Scientific code often has many parameters

pub mod airy;
pub mod body;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod green;
pub mod mesh;
pub mod points;
pub mod problems;
pub mod results;
pub mod solver;
pub mod symbolic;
pub mod timer;

// Re-exports
pub use body::{FloatingBody, FreeSurface};
pub use dataset::{
    assemble_dataset, froude_krylov_force, kochin_function, problems_from_dataset, HydroDataset,
    KochinData, SweepGrid,
};
pub use engine::{BasicMatrixEngine, MatrixEngine};
pub use error::BemError;
pub use green::{GreenFunction, KernelGradient, RankineGreenFunction};
pub use mesh::Mesh;
pub use points::{FreeSurfacePointsSpec, OutputShape, PointsSpec};
pub use problems::{Environment, FreqType, Frequency, Problem, ProblemKind};
pub use results::{FailedResult, PotentialFlowResult, SolveOutcome};
pub use solver::{BemSolver, Method, SolveAllOptions, SolveOptions, PROGRESS_BAR_ENV};
pub use symbolic::{SymbolicComplex, SymbolicScalar, SymbolicVector};
pub use timer::{SolverTimers, Task, Timer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
