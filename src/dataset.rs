//! Parameter sweeps and dataset assembly
//!
//! A [`SweepGrid`] describes a cartesian parameter grid; it expands into
//! concrete problems, is resolved by [`BemSolver::solve_all`], and the
//! outcomes are folded back into a [`HydroDataset`] of added mass,
//! radiation damping, excitation force and optional Kochin functions,
//! stamped with a timestamp and the solver's exportable settings.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::Arc;

use chrono::Utc;
use ndarray::{Array1, Array3};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::airy::{airy_waves_potential, AiryParams};
use crate::body::FloatingBody;
use crate::error::BemError;
use crate::problems::{Environment, Frequency, Problem, ProblemKind};
use crate::results::{PotentialFlowResult, SolveOutcome};
use crate::solver::{BemSolver, SolveAllOptions};
use crate::symbolic::SymbolicScalar;

/// A cartesian parameter grid for a batch computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepGrid {
    /// Angular frequencies of the sweep.
    pub omegas: Vec<f64>,
    /// Incident wave directions; empty for radiation-only sweeps.
    pub wave_directions: Vec<f64>,
    /// Radiating dofs; empty means every dof of each body.
    pub radiating_dofs: Vec<String>,
    /// Kochin-function angles. When present, full details are kept on
    /// every result.
    pub theta: Option<Vec<f64>>,
    /// Water depth shared by the whole sweep.
    pub water_depth: f64,
    /// Gravitational acceleration.
    pub g: f64,
    /// Fluid density.
    pub rho: f64,
    /// Forward speed of the bodies.
    pub forward_speed: f64,
}

impl Default for SweepGrid {
    fn default() -> Self {
        Self {
            omegas: Vec::new(),
            wave_directions: Vec::new(),
            radiating_dofs: Vec::new(),
            theta: None,
            water_depth: f64::INFINITY,
            g: 9.81,
            rho: 1025.0,
            forward_speed: 0.0,
        }
    }
}

impl SweepGrid {
    fn environment(&self) -> Environment {
        Environment {
            free_surface: 0.0,
            water_depth: self.water_depth,
            g: self.g,
            rho: self.rho,
            forward_speed: self.forward_speed,
        }
    }
}

/// Kochin functions of a resolved sweep.
#[derive(Debug, Clone)]
pub struct KochinData {
    /// Angles the functions are evaluated at.
    pub theta: Vec<f64>,
    /// Radiation Kochin functions, `(omega, radiating_dof, theta)`.
    pub radiation: Array3<Complex64>,
    /// Diffraction Kochin functions, `(omega, wave_direction, theta)`.
    pub diffraction: Array3<Complex64>,
}

/// Assembled outputs of a resolved sweep.
///
/// Entries of failed problems are left as NaN.
#[derive(Debug, Clone)]
pub struct HydroDataset {
    /// Frequency coordinate.
    pub omegas: Vec<f64>,
    /// Radiating-dof coordinate.
    pub radiating_dofs: Vec<String>,
    /// Influenced-dof coordinate.
    pub influenced_dofs: Vec<String>,
    /// Wave-direction coordinate.
    pub wave_directions: Vec<f64>,
    /// `Re(F / ω²)`, `(omega, radiating_dof, influenced_dof)`. Finite at
    /// zero and infinite frequency thanks to the symbolic division.
    pub added_mass: Array3<f64>,
    /// `Im(F / ω)`, `(omega, radiating_dof, influenced_dof)`.
    pub radiation_damping: Array3<f64>,
    /// Diffraction plus Froude-Krylov force,
    /// `(omega, wave_direction, influenced_dof)`.
    pub excitation_force: Array3<Complex64>,
    /// Kochin functions, when the grid requested them.
    pub kochin: Option<KochinData>,
    /// Timestamp and solver settings.
    pub attrs: BTreeMap<String, String>,
}

/// Expand a grid into one problem per grid point.
///
/// Radiation problems for each (body, ω, dof) triple, diffraction
/// problems for each (body, ω, direction) triple.
pub fn problems_from_dataset(
    grid: &SweepGrid,
    bodies: &[Arc<FloatingBody>],
) -> Result<Vec<Arc<Problem>>, BemError> {
    let env = grid.environment();
    let mut problems = Vec::new();
    for body in bodies {
        let dofs: Vec<String> = if grid.radiating_dofs.is_empty() {
            body.dof_names()
        } else {
            grid.radiating_dofs.clone()
        };
        for &omega in &grid.omegas {
            for dof in &dofs {
                problems.push(Arc::new(Problem::radiation(
                    body.clone(),
                    Frequency::Omega(omega),
                    dof,
                    &env,
                )?));
            }
            for &beta in &grid.wave_directions {
                problems.push(Arc::new(Problem::diffraction(
                    body.clone(),
                    Frequency::Omega(omega),
                    beta,
                    &env,
                )?));
            }
        }
    }
    Ok(problems)
}

/// Froude-Krylov force: integration of the incident-wave pressure
/// `iωρ Φ₀` over the hull, without any diffraction.
pub fn froude_krylov_force(problem: &Problem) -> BTreeMap<String, Complex64> {
    let body = problem.body();
    let params = AiryParams {
        omega: problem.omega(),
        wavenumber: problem.wavenumber(),
        water_depth: problem.water_depth(),
        free_surface: problem.free_surface(),
        g: problem.g(),
        wave_direction: match problem.kind() {
            ProblemKind::Diffraction { wave_direction } => *wave_direction,
            ProblemKind::Radiation { .. } => 0.0,
        },
    };
    let phi0 = airy_waves_potential(body.mesh().centers(), &params);
    let i_omega_rho = Complex64::new(0.0, problem.omega() * problem.rho());
    let p0 = phi0.mapv(|v| v * i_omega_rho);
    body.integrate_pressure(&p0)
}

/// Far-field Kochin function of one detailed result,
/// `H(θ) = Σ_j σ_j A_j e^{k z_j} e^{−ik(x_j cosθ + y_j sinθ)} / 4π`.
pub fn kochin_function(
    result: &PotentialFlowResult,
    theta: &[f64],
) -> Result<Array1<Complex64>, BemError> {
    let sources = result.sources_or_err()?.to_plain();
    let problem = result.problem();
    let k = problem.encounter_wavenumber();
    let mesh = problem.body().mesh_including_lid();
    let centers = mesh.centers();
    let areas = mesh.areas();

    let mut h = Array1::<Complex64>::zeros(theta.len());
    for (t, &angle) in theta.iter().enumerate() {
        let (ct, st) = (angle.cos(), angle.sin());
        let mut acc = Complex64::new(0.0, 0.0);
        for j in 0..mesh.nb_faces() {
            let decay = (k * centers[[j, 2]]).exp();
            let phase =
                Complex64::new(0.0, -k * (centers[[j, 0]] * ct + centers[[j, 1]] * st)).exp();
            acc += sources[j] * areas[j] * decay * phase;
        }
        h[t] = acc / (4.0 * PI);
    }
    Ok(h)
}

fn index_of_omega(omegas: &[f64], omega: f64) -> Option<usize> {
    omegas
        .iter()
        .position(|&w| w.total_cmp(&omega) == std::cmp::Ordering::Equal)
}

fn index_of_direction(directions: &[f64], beta: f64) -> Option<usize> {
    directions
        .iter()
        .position(|&b| b.total_cmp(&beta) == std::cmp::Ordering::Equal)
}

/// Fold a batch of outcomes back into a labeled dataset.
pub fn assemble_dataset(
    outcomes: &[SolveOutcome],
    grid: &SweepGrid,
    attrs: BTreeMap<String, String>,
) -> HydroDataset {
    let omegas = grid.omegas.clone();
    let mut dof_names: Vec<String> = if grid.radiating_dofs.is_empty() {
        let mut all: Vec<String> = outcomes
            .iter()
            .flat_map(|o| o.problem().body().dof_names())
            .collect();
        all.sort();
        all.dedup();
        all
    } else {
        grid.radiating_dofs.clone()
    };
    dof_names.dedup();
    let directions = grid.wave_directions.clone();

    let (n_omega, n_dof, n_dir) = (omegas.len(), dof_names.len(), directions.len());
    let nan = f64::NAN;
    let cnan = Complex64::new(nan, nan);
    let mut added_mass = Array3::<f64>::from_elem((n_omega, n_dof, n_dof), nan);
    let mut radiation_damping = Array3::<f64>::from_elem((n_omega, n_dof, n_dof), nan);
    let mut excitation = Array3::<Complex64>::from_elem((n_omega, n_dir, n_dof), cnan);
    let mut kochin = grid.theta.as_ref().map(|theta| KochinData {
        theta: theta.clone(),
        radiation: Array3::from_elem((n_omega, n_dof, theta.len()), cnan),
        diffraction: Array3::from_elem((n_omega, n_dir, theta.len()), cnan),
    });

    for outcome in outcomes {
        let SolveOutcome::Solved(result) = outcome else {
            continue;
        };
        let problem = result.problem();
        let Some(w) = index_of_omega(&omegas, problem.omega()) else {
            continue;
        };
        match problem.kind() {
            ProblemKind::Radiation { radiating_dof } => {
                let Some(r) = dof_names.iter().position(|d| d == radiating_dof) else {
                    continue;
                };
                let omega_sym = SymbolicScalar::from_omega(problem.omega());
                for (i, influenced) in dof_names.iter().enumerate() {
                    let Some(force) = result.forces().get(influenced) else {
                        continue;
                    };
                    added_mass[[w, r, i]] =
                        force.div_scalar(omega_sym.squared()).to_complex().re;
                    radiation_damping[[w, r, i]] =
                        force.div_scalar(omega_sym).to_complex().im;
                }
                if let Some(kochin) = kochin.as_mut() {
                    if let Ok(h) = kochin_function(result, &kochin.theta) {
                        for t in 0..kochin.theta.len() {
                            kochin.radiation[[w, r, t]] = h[t];
                        }
                    }
                }
            }
            ProblemKind::Diffraction { wave_direction } => {
                let Some(b) = index_of_direction(&directions, *wave_direction) else {
                    continue;
                };
                let fk = froude_krylov_force(problem);
                for (i, influenced) in dof_names.iter().enumerate() {
                    let Some(force) = result.force(influenced) else {
                        continue;
                    };
                    let fk_part = fk.get(influenced).copied().unwrap_or_default();
                    excitation[[w, b, i]] = force + fk_part;
                }
                if let Some(kochin) = kochin.as_mut() {
                    if let Ok(h) = kochin_function(result, &kochin.theta) {
                        for t in 0..kochin.theta.len() {
                            kochin.diffraction[[w, b, t]] = h[t];
                        }
                    }
                }
            }
        }
    }

    HydroDataset {
        omegas,
        radiating_dofs: dof_names.clone(),
        influenced_dofs: dof_names,
        wave_directions: directions,
        added_mass,
        radiation_damping,
        excitation_force: excitation,
        kochin,
        attrs,
    }
}

impl BemSolver {
    /// Expand a grid into problems, resolve the batch and assemble the
    /// outcomes into a dataset.
    ///
    /// Full details are kept on every result exactly when the grid
    /// carries Kochin angles. The dataset is stamped with the start
    /// timestamp and the solver's exportable settings, with any explicit
    /// method override applied.
    pub fn fill_dataset(
        &self,
        grid: &SweepGrid,
        bodies: &[Arc<FloatingBody>],
        options: &SolveAllOptions,
    ) -> Result<HydroDataset, BemError> {
        let problems = problems_from_dataset(grid, bodies)?;
        let mut batch_options = *options;
        if grid.theta.is_some() {
            batch_options.keep_details = true;
        }

        let start_of_computation = Utc::now();
        let outcomes = self.solve_all(problems, &batch_options)?;

        let mut attrs = self.exportable_settings();
        if let Some(method) = options.method {
            attrs.insert("method".to_string(), method.to_string());
        }
        attrs.insert(
            "start_of_computation".to_string(),
            start_of_computation.to_rfc3339(),
        );
        Ok(assemble_dataset(&outcomes, grid, attrs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::sphere_mesh;
    use crate::solver::Method;

    fn small_body() -> Arc<FloatingBody> {
        let mesh = sphere_mesh("sphere", 1.0, [0.0, 0.0, -2.0], 4, 6);
        let mut body = FloatingBody::new("sphere", mesh);
        body.add_all_translation_dofs();
        Arc::new(body)
    }

    #[test]
    fn test_grid_expansion_counts() {
        let grid = SweepGrid {
            omegas: vec![0.5, 1.0, 1.5],
            wave_directions: vec![0.0, PI],
            ..SweepGrid::default()
        };
        let problems = problems_from_dataset(&grid, &[small_body()]).unwrap();
        // 3 dofs radiation + 2 directions diffraction, per frequency.
        assert_eq!(problems.len(), 3 * (3 + 2));
        assert_eq!(
            problems.iter().filter(|p| p.is_diffraction()).count(),
            3 * 2
        );
    }

    #[test]
    fn test_grid_restricts_radiating_dofs() {
        let grid = SweepGrid {
            omegas: vec![1.0],
            radiating_dofs: vec!["Heave".to_string()],
            ..SweepGrid::default()
        };
        let problems = problems_from_dataset(&grid, &[small_body()]).unwrap();
        assert_eq!(problems.len(), 1);
    }

    #[test]
    fn test_fill_dataset_shapes_and_attrs() {
        let solver = BemSolver::new();
        let grid = SweepGrid {
            omegas: vec![0.8, 1.2],
            wave_directions: vec![0.0],
            ..SweepGrid::default()
        };
        let options = SolveAllOptions {
            progress_bar: Some(false),
            ..SolveAllOptions::default()
        };
        let dataset = solver
            .fill_dataset(&grid, &[small_body()], &options)
            .unwrap();
        assert_eq!(dataset.added_mass.shape(), &[2, 3, 3]);
        assert_eq!(dataset.excitation_force.shape(), &[2, 1, 3]);
        assert!(dataset.added_mass.iter().all(|v| v.is_finite()));
        assert!(dataset.attrs.contains_key("start_of_computation"));
        assert_eq!(dataset.attrs["method"], "indirect");
        assert!(dataset.kochin.is_none());
    }

    #[test]
    fn test_fill_dataset_method_override_is_stamped() {
        let solver = BemSolver::new();
        let grid = SweepGrid {
            omegas: vec![1.0],
            radiating_dofs: vec!["Heave".to_string()],
            ..SweepGrid::default()
        };
        let options = SolveAllOptions {
            method: Some(Method::Direct),
            progress_bar: Some(false),
            ..SolveAllOptions::default()
        };
        let dataset = solver
            .fill_dataset(&grid, &[small_body()], &options)
            .unwrap();
        assert_eq!(dataset.attrs["method"], "direct");
    }

    #[test]
    fn test_kochin_request_forces_details() {
        let solver = BemSolver::new();
        let grid = SweepGrid {
            omegas: vec![1.0],
            wave_directions: vec![0.0],
            radiating_dofs: vec!["Heave".to_string()],
            theta: Some(vec![0.0, PI / 2.0, PI]),
            ..SweepGrid::default()
        };
        let options = SolveAllOptions {
            keep_details: false,
            progress_bar: Some(false),
            ..SolveAllOptions::default()
        };
        let dataset = solver
            .fill_dataset(&grid, &[small_body()], &options)
            .unwrap();
        let kochin = dataset.kochin.expect("kochin output was requested");
        assert_eq!(kochin.radiation.shape(), &[1, 1, 3]);
        assert_eq!(kochin.diffraction.shape(), &[1, 1, 3]);
        assert!(kochin.radiation.iter().all(|v| v.re.is_finite()));
    }

    #[test]
    fn test_zero_frequency_added_mass_is_finite() {
        // The symbolic division makes added mass finite at ω = 0.
        let solver = BemSolver::new();
        let grid = SweepGrid {
            omegas: vec![0.0],
            radiating_dofs: vec!["Heave".to_string()],
            ..SweepGrid::default()
        };
        let dataset = solver
            .fill_dataset(
                &grid,
                &[small_body()],
                &SolveAllOptions {
                    progress_bar: Some(false),
                    ..SolveAllOptions::default()
                },
            )
            .unwrap();
        assert!(dataset.added_mass[[0, 0, 0]].is_finite());
    }

    #[test]
    fn test_froude_krylov_force_is_nonzero() {
        let problem = Problem::diffraction(
            small_body(),
            Frequency::Omega(1.0),
            0.0,
            &Environment::default(),
        )
        .unwrap();
        let fk = froude_krylov_force(&problem);
        assert!(fk.values().any(|f| f.norm() > 0.0));
    }
}
