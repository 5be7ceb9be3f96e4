//! Solver orchestration
//!
//! [`BemSolver`] turns one [`Problem`] into influence-matrix assembly and
//! a linear solve (direct or indirect boundary-integral formulation),
//! derives forces and fields from the solution, runs batches with
//! per-problem failure isolation and optional parallelism, and performs
//! pre-solve diagnostic checks. The Green's function and the matrix
//! engine are injected at construction and never mutated by solve calls;
//! the only cross-call mutable state is the cumulative timing ledger.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{s, Array1, Array2, ArrayD};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::body::FreeSurface;
use crate::engine::{solve_supporting_symbolic, BasicMatrixEngine, MatrixEngine};
use crate::error::BemError;
use crate::green::{GreenFunction, KernelGradient, RankineGreenFunction};
use crate::mesh::Mesh;
use crate::points::{FreeSurfacePointsSpec, PointsSpec};
use crate::problems::{group_for_parallel_resolution, Problem};
use crate::results::{describe_problem, FailedResult, PotentialFlowResult, SolveOutcome};
use crate::symbolic::{SymbolicComplex, SymbolicScalar, SymbolicVector};
use crate::timer::{SolverTimers, Task};

/// Environment variable toggling the batch progress bar.
pub const PROGRESS_BAR_ENV: &str = "CAPYTAINE_PROGRESS_BAR";

/// Boundary-integral formulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    /// Solve directly for the velocity potential.
    Direct,
    /// Solve for a source distribution, then recover the potential.
    Indirect,
}

impl FromStr for Method {
    type Err = BemError;

    fn from_str(s: &str) -> Result<Self, BemError> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(Method::Direct),
            "indirect" => Ok(Method::Indirect),
            other => Err(BemError::Configuration(format!(
                "method must be 'direct' or 'indirect', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Direct => write!(f, "direct"),
            Method::Indirect => write!(f, "indirect"),
        }
    }
}

/// Options of a single [`BemSolver::solve`] call.
#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    /// Override of the solver's configured method.
    pub method: Option<Method>,
    /// Keep sources/potential/pressure on the result, not only forces.
    pub keep_details: bool,
    /// Run the diagnostic checks before solving.
    pub check_wavelength: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            method: None,
            keep_details: true,
            check_wavelength: true,
        }
    }
}

/// Options of a [`BemSolver::solve_all`] call.
#[derive(Debug, Clone, Copy)]
pub struct SolveAllOptions {
    /// Override of the solver's configured method.
    pub method: Option<Method>,
    /// Keep sources/potential/pressure on the results.
    pub keep_details: bool,
    /// Run the diagnostic checks once over the batch.
    pub check_wavelength: bool,
    /// `1` for sequential resolution, `-1` for one worker per core,
    /// `n >= 2` for a pool of `n` workers. Anything else is a
    /// configuration error, as is any value other than `1` without the
    /// `parallel` feature.
    pub n_jobs: i32,
    /// Progress-bar visibility; `None` falls back to the
    /// [`PROGRESS_BAR_ENV`] environment variable, then to `true`.
    pub progress_bar: Option<bool>,
}

impl Default for SolveAllOptions {
    fn default() -> Self {
        Self {
            method: None,
            keep_details: true,
            check_wavelength: true,
            n_jobs: 1,
            progress_bar: None,
        }
    }
}

fn parse_progress_flag(value: &str) -> Result<bool, BemError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "t" => Ok(true),
        "false" | "0" | "f" => Ok(false),
        other => Err(BemError::Configuration(format!(
            "invalid value '{other}' for {PROGRESS_BAR_ENV}, \
             expected one of true|1|t or false|0|f"
        ))),
    }
}

/// Resolve the progress-bar default from the environment, once per
/// `solve_all` call.
fn progress_bar_from_env() -> Result<bool, BemError> {
    match std::env::var(PROGRESS_BAR_ENV) {
        Ok(value) => parse_progress_flag(&value),
        Err(_) => Ok(true),
    }
}

fn make_progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

/// The BEM solver.
pub struct BemSolver {
    green_function: Box<dyn GreenFunction>,
    engine: Box<dyn MatrixEngine>,
    method: Method,
    timers: SolverTimers,
}

impl Default for BemSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl BemSolver {
    /// Solver with the built-in Rankine kernel, the dense engine and the
    /// indirect method.
    pub fn new() -> Self {
        Self {
            green_function: Box::new(RankineGreenFunction::new()),
            engine: Box::new(BasicMatrixEngine::new()),
            method: Method::Indirect,
            timers: SolverTimers::default(),
        }
    }

    /// Swap the Green's function evaluator.
    pub fn with_green_function(mut self, green_function: Box<dyn GreenFunction>) -> Self {
        self.green_function = green_function;
        self
    }

    /// Swap the matrix engine.
    pub fn with_engine(mut self, engine: Box<dyn MatrixEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Set the default boundary-integral method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the default method from a case-insensitive string.
    pub fn with_method_str(self, method: &str) -> Result<Self, BemError> {
        Ok(self.with_method(method.parse()?))
    }

    /// The configured default method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// The cumulative timing ledger.
    pub fn timers(&self) -> &SolverTimers {
        &self.timers
    }

    /// The injected Green's function.
    pub fn green_function(&self) -> &dyn GreenFunction {
        self.green_function.as_ref()
    }

    /// The injected matrix engine.
    pub fn engine(&self) -> &dyn MatrixEngine {
        self.engine.as_ref()
    }

    /// Green's function, engine and method settings, for dataset export.
    pub fn exportable_settings(&self) -> BTreeMap<String, String> {
        let mut settings = self.green_function.exportable_settings();
        settings.extend(self.engine.exportable_settings());
        settings.insert("method".to_string(), self.method.to_string());
        settings
    }

    // ----------------------------------------------------------------
    // Single-problem solve
    // ----------------------------------------------------------------

    /// Solve one problem.
    pub fn solve(
        &self,
        problem: Arc<Problem>,
        options: &SolveOptions,
    ) -> Result<PotentialFlowResult, BemError> {
        self.timers
            .time(Task::SolveTotal, || self.solve_inner(problem, options))
    }

    fn solve_inner(
        &self,
        problem: Arc<Problem>,
        options: &SolveOptions,
    ) -> Result<PotentialFlowResult, BemError> {
        log::info!("Solving {}.", describe_problem(&problem));

        if options.check_wavelength {
            let batch = [problem.clone()];
            self.check_wavelength_and_mesh_resolution(&batch);
            self.check_irregular_frequencies(&batch);
        }

        let (omega_e, k_e) = problem.solving_frequencies();

        // Raised here and not at problem construction, so that batch
        // resolution can isolate it as one failure among many.
        if problem.is_diffraction() && (omega_e == 0.0 || omega_e.is_infinite()) {
            return Err(BemError::UndefinedProblem(format!(
                "the {} has a zero or infinite encounter frequency, for which \
                 the incident wave field is not defined",
                describe_problem(&problem),
            )));
        }

        let method = options.method.unwrap_or(self.method);
        let mesh = problem.body().mesh_including_lid();
        let bc = problem.boundary_condition();

        let (sources, potential) = match method {
            Method::Direct => {
                if problem.forward_speed() != 0.0 {
                    return Err(BemError::NotImplemented(
                        "the direct method does not support forward speed; \
                         use the indirect method"
                            .to_string(),
                    ));
                }
                let (s_matrix, d_matrix) = self.timers.time(Task::GreenFunction, || {
                    self.engine.build_matrices(
                        &mesh,
                        &mesh,
                        problem.free_surface(),
                        problem.water_depth(),
                        k_e,
                        self.green_function.as_ref(),
                        false,
                    )
                })?;
                let rhs = bc.map_values(|v| s_matrix.dot(v));
                let potential = self.timers.time(Task::LinearSolver, || {
                    solve_supporting_symbolic(self.engine.as_ref(), &d_matrix, &rhs)
                })?;
                self.check_solution_shape(bc.len(), potential.len())?;
                (None, potential)
            }
            Method::Indirect => {
                let (s_matrix, k_matrix) = self.timers.time(Task::GreenFunction, || {
                    self.engine.build_matrices(
                        &mesh,
                        &mesh,
                        problem.free_surface(),
                        problem.water_depth(),
                        k_e,
                        self.green_function.as_ref(),
                        true,
                    )
                })?;
                let sources = self.timers.time(Task::LinearSolver, || {
                    solve_supporting_symbolic(self.engine.as_ref(), &k_matrix, bc)
                })?;
                self.check_solution_shape(bc.len(), sources.len())?;
                let potential = sources.map_values(|sigma| s_matrix.dot(sigma));
                (Some(sources), potential)
            }
        };

        let i_omega_rho = SymbolicComplex::from_scalar(SymbolicScalar::from_omega(omega_e))
            .times(Complex64::new(0.0, problem.rho()));
        let mut pressure = potential.scale(i_omega_rho);

        if problem.forward_speed() != 0.0 {
            // Linearized steady-motion contribution to hull pressure,
            // ρ U ∂φ/∂x, from the gradient of the stored sources. Only
            // reachable on the indirect path.
            let Some(sources) = sources.as_ref() else {
                return Err(BemError::NotImplemented(
                    "forward-speed pressure correction requires the indirect method"
                        .to_string(),
                ));
            };
            let (_, u) = self.velocity_from_sources(
                mesh.centers(),
                sources,
                &mesh,
                problem.free_surface(),
                problem.water_depth(),
                k_e,
            )?;
            let correction = u
                .column(0)
                .mapv(|dphidx| dphidx * problem.rho() * problem.forward_speed());
            pressure.add_plain(&correction);
        }

        // The lid only conditions the linear system; forces come from
        // the hull faces alone.
        let n_hull = problem.body().mesh().nb_faces();
        let hull_pressure = pressure.values().slice(s![..n_hull]).to_owned();
        let forces: BTreeMap<String, SymbolicComplex> = problem
            .body()
            .integrate_pressure(&hull_pressure)
            .into_iter()
            .map(|(dof, f)| (dof, SymbolicComplex::with_exponent(pressure.exponent(), f)))
            .collect();

        let result = if options.keep_details {
            PotentialFlowResult::new(problem, forces, sources, Some(potential), Some(pressure))
        } else {
            PotentialFlowResult::new(problem, forces, None, None, None)
        };
        log::debug!("Done solving {}.", result.describe());
        Ok(result)
    }

    fn check_solution_shape(&self, expected: usize, got: usize) -> Result<(), BemError> {
        if expected != got {
            Err(BemError::EngineContract {
                engine: self.engine.name().to_string(),
                expected,
                got,
            })
        } else {
            Ok(())
        }
    }

    /// Solve one problem, converting any error into a [`FailedResult`].
    /// The single isolation boundary of batch resolution.
    pub fn solve_and_catch_errors(
        &self,
        problem: Arc<Problem>,
        options: &SolveOptions,
    ) -> SolveOutcome {
        match self.solve(problem.clone(), options) {
            Ok(result) => SolveOutcome::Solved(result),
            Err(error) => {
                log::info!(
                    "Skipping unsolvable {}: {}",
                    describe_problem(&problem),
                    error
                );
                SolveOutcome::Failed(FailedResult::new(problem, error))
            }
        }
    }

    // ----------------------------------------------------------------
    // Batch resolution
    // ----------------------------------------------------------------

    /// Solve a batch of problems, one outcome per problem.
    ///
    /// Problems are solved in their sorted order (sequential path) or
    /// grouped by shared influence matrices (parallel path); the output
    /// follows that order. Individual failures never escape; only setup
    /// errors (bad environment toggle, bad `n_jobs`) do.
    pub fn solve_all(
        &self,
        problems: Vec<Arc<Problem>>,
        options: &SolveAllOptions,
    ) -> Result<Vec<SolveOutcome>, BemError> {
        let progress_visible = match options.progress_bar {
            Some(visible) => visible,
            None => progress_bar_from_env()?,
        };

        if options.check_wavelength {
            self.check_wavelength_and_mesh_resolution(&problems);
            self.check_irregular_frequencies(&problems);
        }

        let outcomes = if options.n_jobs == 1 {
            let per_problem = SolveOptions {
                method: options.method,
                keep_details: options.keep_details,
                check_wavelength: false,
            };
            let mut sorted = problems;
            sorted.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));
            let bar = make_progress_bar(sorted.len(), progress_visible);
            let outcomes: Vec<SolveOutcome> = sorted
                .into_iter()
                .map(|problem| {
                    let outcome = self.solve_and_catch_errors(problem, &per_problem);
                    bar.inc(1);
                    outcome
                })
                .collect();
            bar.finish_and_clear();
            outcomes
        } else {
            self.solve_in_parallel(problems, options, progress_visible)?
        };

        log::info!("Timings:\n{}", self.timers.summary());
        Ok(outcomes)
    }

    #[cfg(feature = "parallel")]
    fn solve_in_parallel(
        &self,
        problems: Vec<Arc<Problem>>,
        options: &SolveAllOptions,
        progress_visible: bool,
    ) -> Result<Vec<SolveOutcome>, BemError> {
        use rayon::prelude::*;

        let num_threads = match options.n_jobs {
            -1 => None,
            n if n >= 2 => Some(n as usize),
            other => {
                return Err(BemError::Configuration(format!(
                    "n_jobs must be 1, -1 or >= 2, got {other}"
                )))
            }
        };
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = num_threads {
            builder = builder.num_threads(n);
        }
        let pool = builder.build().map_err(|e| {
            BemError::Configuration(format!("could not start the worker pool: {e}"))
        })?;

        // Each group shares its influence matrices and is resolved
        // sequentially by a recursive call; the outer bar ticks per
        // group.
        let groups = group_for_parallel_resolution(problems);
        let bar = make_progress_bar(groups.len(), progress_visible);
        let inner = SolveAllOptions {
            method: options.method,
            keep_details: options.keep_details,
            check_wavelength: false,
            n_jobs: 1,
            progress_bar: Some(false),
        };
        let nested: Vec<Vec<SolveOutcome>> = pool.install(|| {
            groups
                .into_par_iter()
                .map(|group| {
                    let outcomes = self.solve_all(group, &inner);
                    bar.inc(1);
                    outcomes
                })
                .collect::<Result<Vec<_>, _>>()
        })?;
        bar.finish_and_clear();
        Ok(nested.into_iter().flatten().collect())
    }

    #[cfg(not(feature = "parallel"))]
    fn solve_in_parallel(
        &self,
        _problems: Vec<Arc<Problem>>,
        options: &SolveAllOptions,
        _progress_visible: bool,
    ) -> Result<Vec<SolveOutcome>, BemError> {
        Err(BemError::Configuration(format!(
            "n_jobs = {} requires the 'parallel' feature",
            options.n_jobs
        )))
    }

    // ----------------------------------------------------------------
    // Diagnostic checks
    // ----------------------------------------------------------------

    /// Warn about problems whose wavelength is too short for the mesh
    /// resolution. Never fails.
    pub fn check_wavelength_and_mesh_resolution(&self, problems: &[Arc<Problem>]) {
        let risky: Vec<&Arc<Problem>> = problems
            .iter()
            .filter(|p| {
                let wavelength = p.wavelength();
                wavelength > 0.0
                    && wavelength.is_finite()
                    && wavelength < p.body().minimal_computable_wavelength()
            })
            .collect();
        if risky.is_empty() {
            return;
        }
        log::warn!(
            "The resolution of the mesh might be insufficient for {}: \
             some panels are larger than an eighth of the wavelength.",
            frequency_range_description(&risky),
        );
    }

    /// Warn about problems whose frequency lies above the body's first
    /// irregular frequency. Never fails.
    pub fn check_irregular_frequencies(&self, problems: &[Arc<Problem>]) {
        let risky: Vec<&Arc<Problem>> = problems
            .iter()
            .filter(|p| {
                p.free_surface().is_finite()
                    && p.omega().is_finite()
                    && p.omega() > p.body().first_irregular_frequency_estimate(p.g())
            })
            .collect();
        if risky.is_empty() {
            return;
        }
        let recommendation = if problems.iter().any(|p| p.body().lid_mesh().is_some()) {
            "moving the lid mesh closer to the free surface"
        } else {
            "adding a lid mesh to the body"
        };
        log::warn!(
            "Irregular frequencies might perturb the results for {}. \
             Consider {}.",
            frequency_range_description(&risky),
            recommendation,
        );
    }

    // ----------------------------------------------------------------
    // Field evaluation from stored sources
    // ----------------------------------------------------------------

    fn potential_at_points(
        &self,
        result: &PotentialFlowResult,
        points: &Array2<f64>,
    ) -> Result<SymbolicVector, BemError> {
        let sources = result.sources_or_err()?;
        let problem = result.problem();
        let (_, k_e) = problem.solving_frequencies();
        let mesh = problem.body().mesh_including_lid();
        let (s_matrix, _) = self.timers.time(Task::GreenFunction, || {
            self.green_function.evaluate(
                points,
                &mesh,
                problem.free_surface(),
                problem.water_depth(),
                k_e,
                true,
            )
        })?;
        Ok(sources.map_values(|sigma| s_matrix.dot(sigma)))
    }

    fn velocity_from_sources(
        &self,
        points: &Array2<f64>,
        sources: &SymbolicVector,
        mesh: &Mesh,
        free_surface: f64,
        water_depth: f64,
        wavenumber: f64,
    ) -> Result<(i32, Array2<Complex64>), BemError> {
        let (_, gradient) = self.timers.time(Task::GreenFunction, || {
            self.green_function
                .evaluate(points, mesh, free_surface, water_depth, wavenumber, false)
        })?;
        let KernelGradient::Full(grad) = gradient else {
            return Err(BemError::Solver(
                "green function did not return a full gradient".to_string(),
            ));
        };
        let m = points.nrows();
        let n = mesh.nb_faces();
        let sigma = sources.values();
        let mut u = Array2::<Complex64>::zeros((m, 3));
        for i in 0..m {
            for axis in 0..3 {
                let mut v = Complex64::new(0.0, 0.0);
                for j in 0..n {
                    v += grad[[i, j, axis]] * sigma[j];
                }
                u[[i, axis]] = v;
            }
        }
        Ok((sources.exponent(), u))
    }

    fn velocity_at_points(
        &self,
        result: &PotentialFlowResult,
        points: &Array2<f64>,
    ) -> Result<(i32, Array2<Complex64>), BemError> {
        let sources = result.sources_or_err()?;
        let problem = result.problem();
        let (_, k_e) = problem.solving_frequencies();
        let mesh = problem.body().mesh_including_lid();
        self.velocity_from_sources(
            points,
            sources,
            &mesh,
            problem.free_surface(),
            problem.water_depth(),
            k_e,
        )
    }

    /// Velocity potential at arbitrary points, folded to the shape of
    /// the point specification.
    pub fn compute_potential(
        &self,
        points: &PointsSpec<'_>,
        result: &PotentialFlowResult,
    ) -> Result<ArrayD<Complex64>, BemError> {
        let (pts, shape) = points.normalize()?;
        let phi = self.potential_at_points(result, &pts)?;
        shape.fold(phi.to_plain())
    }

    /// Fluid velocity at arbitrary points, with a trailing axis of
    /// length 3. With forward speed the x component is shifted to the
    /// steady body frame.
    pub fn compute_velocity(
        &self,
        points: &PointsSpec<'_>,
        result: &PotentialFlowResult,
    ) -> Result<ArrayD<Complex64>, BemError> {
        let (pts, shape) = points.normalize()?;
        let (exponent, u) = self.velocity_at_points(result, &pts)?;
        let m = pts.nrows();
        let mut plain = Array2::<Complex64>::zeros((m, 3));
        for axis in 0..3 {
            let column =
                SymbolicVector::with_exponent(exponent, u.column(axis).to_owned()).to_plain();
            plain.column_mut(axis).assign(&column);
        }
        let forward_speed = result.problem().forward_speed();
        if forward_speed != 0.0 {
            for i in 0..m {
                plain[[i, 0]] -= forward_speed;
            }
        }
        shape.fold_vectors(plain)
    }

    /// Dynamic pressure at arbitrary points.
    pub fn compute_pressure(
        &self,
        points: &PointsSpec<'_>,
        result: &PotentialFlowResult,
    ) -> Result<ArrayD<Complex64>, BemError> {
        let (pts, shape) = points.normalize()?;
        let problem = result.problem();
        let (omega_e, _) = problem.solving_frequencies();
        let phi = self.potential_at_points(result, &pts)?;
        let i_omega_rho = SymbolicComplex::from_scalar(SymbolicScalar::from_omega(omega_e))
            .times(Complex64::new(0.0, problem.rho()));
        let mut pressure = phi.scale(i_omega_rho);
        if problem.forward_speed() != 0.0 {
            let (_, u) = self.velocity_at_points(result, &pts)?;
            let correction = u
                .column(0)
                .mapv(|dphidx| dphidx * problem.rho() * problem.forward_speed());
            pressure.add_plain(&correction);
        }
        shape.fold(pressure.to_plain())
    }

    /// Free-surface elevation at horizontal points,
    /// `η = (iω φ − U ∂φ/∂x) / g` on the free-surface plane.
    pub fn compute_free_surface_elevation(
        &self,
        points: &FreeSurfacePointsSpec<'_>,
        result: &PotentialFlowResult,
    ) -> Result<ArrayD<Complex64>, BemError> {
        let problem = result.problem();
        let (pts, shape) = points.normalize(problem.free_surface())?;
        let (omega_e, _) = problem.solving_frequencies();
        let phi = self.potential_at_points(result, &pts)?;
        let i_omega_over_g = SymbolicComplex::from_scalar(SymbolicScalar::from_omega(omega_e))
            .times(Complex64::new(0.0, 1.0 / problem.g()));
        let mut elevation = phi.scale(i_omega_over_g);
        if problem.forward_speed() != 0.0 {
            let (_, u) = self.velocity_at_points(result, &pts)?;
            let correction = u
                .column(0)
                .mapv(|dphidx| -dphidx * problem.forward_speed() / problem.g());
            elevation.add_plain(&correction);
        }
        shape.fold(elevation.to_plain())
    }

    // ----------------------------------------------------------------
    // Legacy chunked evaluation
    // ----------------------------------------------------------------

    /// Potential over the faces of an arbitrary mesh, building the
    /// influence matrix in row chunks of at most `chunk_size` faces when
    /// the target mesh is larger than one chunk.
    pub fn get_potential_on_mesh(
        &self,
        result: &PotentialFlowResult,
        mesh: &Mesh,
        chunk_size: usize,
    ) -> Result<Array1<Complex64>, BemError> {
        let sources = result.sources_or_err()?;
        let problem = result.problem();
        // For backward compatibility this path keeps the problem's own
        // wavenumber, not the encounter one.
        let k = problem.wavenumber();
        let body_mesh = problem.body().mesh_including_lid();
        let n = mesh.nb_faces();

        let mut phi = Array1::<Complex64>::zeros(n);
        if chunk_size > n {
            let s_matrix = self.timers.time(Task::GreenFunction, || {
                self.engine.build_s_matrix(
                    mesh,
                    &body_mesh,
                    problem.free_surface(),
                    problem.water_depth(),
                    k,
                    self.green_function.as_ref(),
                )
            })?;
            phi = s_matrix.dot(sources.values());
        } else {
            let mut start = 0;
            while start < n {
                let end = (start + chunk_size).min(n);
                let faces: Vec<usize> = (start..end).collect();
                let chunk = mesh.extract_faces(&faces);
                let s_matrix = self.timers.time(Task::GreenFunction, || {
                    self.engine.build_s_matrix(
                        &chunk,
                        &body_mesh,
                        problem.free_surface(),
                        problem.water_depth(),
                        k,
                        self.green_function.as_ref(),
                    )
                })?;
                let phi_chunk = s_matrix.dot(sources.values());
                phi.slice_mut(s![start..end]).assign(&phi_chunk);
                start = end;
            }
        }
        Ok(SymbolicVector::with_exponent(sources.exponent(), phi).to_plain())
    }

    /// Free-surface elevation over a [`FreeSurface`] mesh,
    /// `η = iω φ / g`, with the chunked evaluation of
    /// [`Self::get_potential_on_mesh`]. With `keep_details` the field is
    /// cached on the result under the free surface's id, last write
    /// wins. Forward speed is not supported by this legacy path.
    pub fn get_free_surface_elevation(
        &self,
        result: &mut PotentialFlowResult,
        free_surface: &FreeSurface,
        keep_details: bool,
    ) -> Result<Array1<Complex64>, BemError> {
        if result.problem().forward_speed() != 0.0 {
            return Err(BemError::NotImplemented(
                "free-surface elevation on a mesh is not available with forward speed; \
                 use compute_free_surface_elevation"
                    .to_string(),
            ));
        }
        let phi = self.get_potential_on_mesh(result, free_surface.mesh(), 50)?;
        let (omega_e, _) = result.problem().solving_frequencies();
        let factor = Complex64::new(0.0, omega_e / result.problem().g());
        let elevation = phi.mapv(|v| v * factor);
        if keep_details {
            result.cache_fs_elevation(free_surface.id(), elevation.clone());
        }
        Ok(elevation)
    }
}

/// Aggregate the frequencies of risky problems into one human-readable
/// description, in the convention each problem was specified with.
fn frequency_range_description(problems: &[&Arc<Problem>]) -> String {
    let mut by_label: BTreeMap<&'static str, Vec<f64>> = BTreeMap::new();
    for p in problems {
        by_label
            .entry(p.provided_freq_type().label())
            .or_default()
            .push(p.provided_freq_value());
    }
    let parts: Vec<String> = by_label
        .into_iter()
        .map(|(label, mut values)| {
            values.sort_by(f64::total_cmp);
            let first = values[0];
            let last = values[values.len() - 1];
            if values.len() == 1 || first == last {
                format!("{label} = {first:.4}")
            } else {
                format!("{label} from {first:.4} to {last:.4}")
            }
        })
        .collect();
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing_is_case_insensitive() {
        assert_eq!("Direct".parse::<Method>().unwrap(), Method::Direct);
        assert_eq!("INDIRECT".parse::<Method>().unwrap(), Method::Indirect);
        assert!(matches!(
            "galerkin".parse::<Method>(),
            Err(BemError::Configuration(_))
        ));
    }

    #[test]
    fn test_progress_flag_parsing() {
        for value in ["true", "True", "1", "T"] {
            assert_eq!(parse_progress_flag(value).unwrap(), true);
        }
        for value in ["false", "FALSE", "0", "f"] {
            assert_eq!(parse_progress_flag(value).unwrap(), false);
        }
        assert!(matches!(
            parse_progress_flag("banana"),
            Err(BemError::Configuration(_))
        ));
    }

    #[test]
    fn test_exportable_settings_contain_method() {
        let solver = BemSolver::new();
        let settings = solver.exportable_settings();
        assert_eq!(settings["method"], "indirect");
        assert!(settings.contains_key("green_function"));
        assert!(settings.contains_key("engine"));
    }

    #[test]
    fn test_solver_construction_from_string() {
        let solver = BemSolver::new().with_method_str("DIRECT").unwrap();
        assert_eq!(solver.method(), Method::Direct);
        assert!(BemSolver::new().with_method_str("nope").is_err());
    }

    #[test]
    fn test_frequency_range_description_mixed_conventions() {
        use crate::body::FloatingBody;
        use crate::mesh::sphere_mesh;
        use crate::problems::{Environment, Frequency};

        let mesh = sphere_mesh("sphere", 1.0, [0.0, 0.0, -2.0], 4, 6);
        let mut body = FloatingBody::new("sphere", mesh);
        body.add_all_translation_dofs();
        let body = Arc::new(body);
        let env = Environment::default();
        let a = Arc::new(
            Problem::radiation(body.clone(), Frequency::Omega(1.0), "Heave", &env).unwrap(),
        );
        let b = Arc::new(
            Problem::radiation(body.clone(), Frequency::Omega(3.0), "Heave", &env).unwrap(),
        );
        let c = Arc::new(
            Problem::radiation(body, Frequency::Period(2.0), "Heave", &env).unwrap(),
        );
        let text = frequency_range_description(&[&a, &b, &c]);
        assert!(text.contains("omega from 1.0000 to 3.0000"));
        assert!(text.contains("period = 2.0000"));
    }
}
