//! Solve result containers
//!
//! A [`PotentialFlowResult`] owns the generalized forces and, when
//! details are kept, the source distribution, potential and pressure over
//! the lid-inclusive faces. A [`FailedResult`] wraps the error that made
//! one problem unsolvable. Every submitted problem maps to exactly one
//! [`SolveOutcome`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use ndarray::Array1;
use num_complex::Complex64;

use crate::body::FloatingBody;
use crate::error::BemError;
use crate::problems::{Problem, ProblemKind};
use crate::symbolic::{SymbolicComplex, SymbolicVector};

/// Outputs of one successfully solved problem.
#[derive(Debug, Clone)]
pub struct PotentialFlowResult {
    problem: Arc<Problem>,
    forces: BTreeMap<String, SymbolicComplex>,
    sources: Option<SymbolicVector>,
    potential: Option<SymbolicVector>,
    pressure: Option<SymbolicVector>,
    fs_elevation: HashMap<String, Array1<Complex64>>,
}

impl PotentialFlowResult {
    /// Assemble a result. `sources` is `None` for the direct method or
    /// when details are not kept.
    pub fn new(
        problem: Arc<Problem>,
        forces: BTreeMap<String, SymbolicComplex>,
        sources: Option<SymbolicVector>,
        potential: Option<SymbolicVector>,
        pressure: Option<SymbolicVector>,
    ) -> Self {
        Self {
            problem,
            forces,
            sources,
            potential,
            pressure,
            fs_elevation: HashMap::new(),
        }
    }

    /// The problem this result answers.
    pub fn problem(&self) -> &Arc<Problem> {
        &self.problem
    }

    /// The body of the underlying problem.
    pub fn body(&self) -> &Arc<FloatingBody> {
        self.problem.body()
    }

    /// Generalized forces from hull pressure integration, one per dof.
    pub fn forces(&self) -> &BTreeMap<String, SymbolicComplex> {
        &self.forces
    }

    /// One force component collapsed to a plain complex number.
    pub fn force(&self, dof: &str) -> Option<Complex64> {
        self.forces.get(dof).map(SymbolicComplex::to_complex)
    }

    /// Source distribution over the lid-inclusive faces, present only
    /// when solved by the indirect method with details kept.
    pub fn sources(&self) -> Option<&SymbolicVector> {
        self.sources.as_ref()
    }

    /// Velocity potential over the lid-inclusive faces, if kept.
    pub fn potential(&self) -> Option<&SymbolicVector> {
        self.potential.as_ref()
    }

    /// Pressure over the lid-inclusive faces, if kept.
    pub fn pressure(&self) -> Option<&SymbolicVector> {
        self.pressure.as_ref()
    }

    /// The source distribution, or the data-availability error telling
    /// the caller how to get one.
    pub fn sources_or_err(&self) -> Result<&SymbolicVector, BemError> {
        self.sources.as_ref().ok_or_else(|| {
            BemError::MissingSources(format!(
                "result for {} has no source distribution; \
                 re-solve with the indirect method and keep_details = true",
                self.describe(),
            ))
        })
    }

    /// Cached free-surface elevations, keyed by free-surface id.
    pub fn fs_elevation(&self) -> &HashMap<String, Array1<Complex64>> {
        &self.fs_elevation
    }

    /// Cache an elevation field under a free-surface id. Last write wins.
    pub fn cache_fs_elevation(&mut self, id: impl Into<String>, elevation: Array1<Complex64>) {
        self.fs_elevation.insert(id.into(), elevation);
    }

    /// Short human-readable description for logs and error messages.
    pub fn describe(&self) -> String {
        describe_problem(&self.problem)
    }
}

/// A problem that could not be solved, with the triggering error.
#[derive(Debug, Clone)]
pub struct FailedResult {
    problem: Arc<Problem>,
    error: BemError,
}

impl FailedResult {
    /// Wrap the error that made the problem unsolvable.
    pub fn new(problem: Arc<Problem>, error: BemError) -> Self {
        Self { problem, error }
    }

    /// The problem that failed.
    pub fn problem(&self) -> &Arc<Problem> {
        &self.problem
    }

    /// The error that made it fail.
    pub fn error(&self) -> &BemError {
        &self.error
    }
}

/// Exactly one outcome per submitted problem.
#[derive(Debug, Clone)]
pub enum SolveOutcome {
    /// The problem was solved.
    Solved(PotentialFlowResult),
    /// The problem failed; the batch went on.
    Failed(FailedResult),
}

impl SolveOutcome {
    /// The result, if the problem was solved.
    pub fn result(&self) -> Option<&PotentialFlowResult> {
        match self {
            SolveOutcome::Solved(r) => Some(r),
            SolveOutcome::Failed(_) => None,
        }
    }

    /// The failure, if the problem failed.
    pub fn failure(&self) -> Option<&FailedResult> {
        match self {
            SolveOutcome::Solved(_) => None,
            SolveOutcome::Failed(f) => Some(f),
        }
    }

    /// The problem behind the outcome.
    pub fn problem(&self) -> &Arc<Problem> {
        match self {
            SolveOutcome::Solved(r) => r.problem(),
            SolveOutcome::Failed(f) => f.problem(),
        }
    }
}

/// One-line description of a problem for logs and error messages.
pub fn describe_problem(problem: &Problem) -> String {
    let drive = match problem.kind() {
        ProblemKind::Radiation { radiating_dof } => {
            format!("radiation of '{radiating_dof}'")
        }
        ProblemKind::Diffraction { wave_direction } => {
            format!("diffraction at beta = {wave_direction:.3} rad")
        }
    };
    format!(
        "{} for body '{}' at {} = {:.4}",
        drive,
        problem.body().name(),
        problem.provided_freq_type().label(),
        problem.provided_freq_value(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::FloatingBody;
    use crate::mesh::sphere_mesh;
    use crate::problems::{Environment, Frequency};
    use ndarray::array;

    fn solved_result(sources: Option<SymbolicVector>) -> PotentialFlowResult {
        let mesh = sphere_mesh("sphere", 1.0, [0.0, 0.0, -2.0], 4, 6);
        let mut body = FloatingBody::new("sphere", mesh);
        body.add_all_translation_dofs();
        let problem = Problem::radiation(
            Arc::new(body),
            Frequency::Omega(1.0),
            "Heave",
            &Environment::default(),
        )
        .unwrap();
        PotentialFlowResult::new(Arc::new(problem), BTreeMap::new(), sources, None, None)
    }

    #[test]
    fn test_missing_sources_message_names_the_remedy() {
        let result = solved_result(None);
        let err = result.sources_or_err().unwrap_err();
        assert!(matches!(err, BemError::MissingSources(_)));
        assert!(err.to_string().contains("keep_details"));
    }

    #[test]
    fn test_fs_elevation_cache_last_write_wins() {
        let mut result = solved_result(None);
        result.cache_fs_elevation("fs", array![Complex64::new(1.0, 0.0)]);
        result.cache_fs_elevation("fs", array![Complex64::new(2.0, 0.0)]);
        assert_eq!(result.fs_elevation()["fs"][0], Complex64::new(2.0, 0.0));
    }

    #[test]
    fn test_outcome_accessors() {
        let solved = SolveOutcome::Solved(solved_result(None));
        assert!(solved.result().is_some());
        assert!(solved.failure().is_none());
        let failed = SolveOutcome::Failed(FailedResult::new(
            solved.problem().clone(),
            BemError::UndefinedProblem("zero-frequency diffraction".to_string()),
        ));
        assert!(failed.result().is_none());
        assert!(failed.failure().is_some());
    }
}
