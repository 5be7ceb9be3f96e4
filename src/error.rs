//! Error types for the BEM solver
//!
//! The taxonomy distinguishes errors by how far they propagate:
//! configuration errors abort the enclosing call, per-problem domain and
//! engine-contract errors are caught by batch resolution and turned into
//! failed results, and data-availability errors are always fatal to the
//! field-evaluation call that raised them.

use thiserror::Error;

/// Errors raised by the solver and its collaborators.
///
/// All payloads are owned strings or plain integers so that a `BemError`
/// can be cloned into a [`crate::results::FailedResult`] and inspected
/// after batch resolution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BemError {
    /// Invalid solver configuration (bad method string, bad environment
    /// toggle, bad `n_jobs`, missing parallel capability). Never caught
    /// internally.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The problem is mathematically undefined (e.g. diffraction at zero
    /// or infinite frequency). Fatal to a single solve, isolated by
    /// batch resolution.
    #[error("{0}")]
    UndefinedProblem(String),

    /// A genuine capability gap, not a bug.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// The linear solver returned a vector whose shape does not match
    /// the boundary condition. Signals a broken engine/solver pairing.
    #[error(
        "Error in linear solver of {engine}: the shape of the output ({got}) \
         does not match the expected shape ({expected})"
    )]
    EngineContract {
        /// Name of the offending matrix engine.
        engine: String,
        /// Expected solution length (the boundary condition length).
        expected: usize,
        /// Length actually returned by the linear solver.
        got: usize,
    },

    /// The result given to a field-evaluation operation does not retain
    /// its source distribution.
    #[error(
        "The source distribution of {0} is not available. It was probably not \
         stored because keep_details=true was not set or the direct method was \
         used. Please re-run the resolution with the indirect method and \
         keep_details=true."
    )]
    MissingSources(String),

    /// Failure inside the linear-algebra engine (singular matrix, ...).
    #[error("Solver failed: {0}")]
    Solver(String),

    /// A mesh that cannot be used for assembly (zero faces, mismatched
    /// array lengths, ...).
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_contract_message_names_engine() {
        let e = BemError::EngineContract {
            engine: "BasicMatrixEngine".to_string(),
            expected: 12,
            got: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("BasicMatrixEngine"));
        assert!(msg.contains("12"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn test_errors_are_cloneable() {
        let e = BemError::Configuration("bad method".to_string());
        assert_eq!(e.clone(), e);
    }
}
