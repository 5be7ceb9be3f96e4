//! Radiation and diffraction problem model
//!
//! A [`Problem`] is an immutable description of one linear potential-flow
//! computation: physical environment, frequency (given as any of angular
//! frequency, period, wavenumber or wavelength, the rest derived through
//! the dispersion relation), body, and the boundary condition vector over
//! the lid-inclusive faces. Problems are totally ordered so that batches
//! can be solved in a deterministic order and grouped by shared influence
//! matrices.

use std::cmp::Ordering;
use std::sync::Arc;

use ndarray::Array1;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::airy::{airy_waves_velocity, AiryParams};
use crate::body::FloatingBody;
use crate::error::BemError;
use crate::symbolic::{SymbolicComplex, SymbolicScalar, SymbolicVector};

/// Physical environment shared by a set of problems.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    /// Free-surface elevation, `0.0` or `+∞` (no free surface).
    pub free_surface: f64,
    /// Water depth, positive, possibly `+∞`.
    pub water_depth: f64,
    /// Gravitational acceleration (m/s²).
    pub g: f64,
    /// Fluid density (kg/m³).
    pub rho: f64,
    /// Steady forward speed of the body along +x (m/s).
    pub forward_speed: f64,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            free_surface: 0.0,
            water_depth: f64::INFINITY,
            g: 9.81,
            rho: 1025.0,
            forward_speed: 0.0,
        }
    }
}

/// How the caller specified the frequency of a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FreqType {
    /// Angular frequency ω (rad/s).
    Omega,
    /// Period T = 2π/ω (s).
    Period,
    /// Wavenumber k (rad/m).
    Wavenumber,
    /// Wavelength λ = 2π/k (m).
    Wavelength,
}

impl FreqType {
    /// Attribute name used in warnings and dataset coordinates.
    pub fn label(&self) -> &'static str {
        match self {
            FreqType::Omega => "omega",
            FreqType::Period => "period",
            FreqType::Wavenumber => "wavenumber",
            FreqType::Wavelength => "wavelength",
        }
    }
}

/// A frequency specification, any one of the four conventions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Frequency {
    /// Angular frequency ω (rad/s), `0.0` and `+∞` allowed.
    Omega(f64),
    /// Period T (s).
    Period(f64),
    /// Wavenumber k (rad/m).
    Wavenumber(f64),
    /// Wavelength λ (m).
    Wavelength(f64),
}

/// Solve the dispersion relation `ω² = g k tanh(k h)` for k.
///
/// Closed form `k = ω²/g` in infinite depth; Newton iteration from the
/// deep-water guess otherwise. `ω = 0` and `ω = ∞` map to `k = 0` and
/// `k = ∞`.
pub fn wavenumber_from_omega(omega: f64, g: f64, water_depth: f64) -> f64 {
    if omega == 0.0 {
        return 0.0;
    }
    if omega.is_infinite() {
        return f64::INFINITY;
    }
    let deep = omega * omega / g;
    if water_depth.is_infinite() || deep * water_depth > 20.0 {
        return deep;
    }
    let h = water_depth;
    let target = deep;
    let mut k = deep.max(target / h.min(1.0)).max(1e-12);
    for _ in 0..100 {
        let th = (k * h).tanh();
        let f = k * th - target;
        let df = th + k * h * (1.0 - th * th);
        let step = f / df;
        k -= step;
        if k <= 0.0 {
            k = 1e-12;
        }
        if step.abs() < 1e-14 * k.max(1.0) {
            break;
        }
    }
    k
}

/// Angular frequency from a wavenumber through the dispersion relation.
pub fn omega_from_wavenumber(k: f64, g: f64, water_depth: f64) -> f64 {
    if k == 0.0 {
        return 0.0;
    }
    if k.is_infinite() {
        return f64::INFINITY;
    }
    if water_depth.is_infinite() || k * water_depth > 20.0 {
        (g * k).sqrt()
    } else {
        (g * k * (k * water_depth).tanh()).sqrt()
    }
}

/// What drives the flow.
#[derive(Debug, Clone, PartialEq)]
pub enum ProblemKind {
    /// Forced motion of the body along one of its own degrees of freedom.
    Radiation {
        /// Name of the radiating degree of freedom.
        radiating_dof: String,
    },
    /// Incident Airy wave against the (possibly moving) body.
    Diffraction {
        /// Propagation direction of the incident wave (rad, 0 = +x).
        wave_direction: f64,
    },
}

/// One linear potential-flow problem.
#[derive(Debug, Clone)]
pub struct Problem {
    body: Arc<FloatingBody>,
    free_surface: f64,
    water_depth: f64,
    g: f64,
    rho: f64,
    forward_speed: f64,
    omega: f64,
    wavenumber: f64,
    provided_freq_type: FreqType,
    kind: ProblemKind,
    boundary_condition: SymbolicVector,
}

impl Problem {
    /// Build a radiation problem for one of the body's degrees of freedom.
    ///
    /// The boundary condition is `(−iω)(n · V)` over the hull faces and
    /// zero over the lid, with the `−iω` prefactor carried symbolically
    /// when `ω ∈ {0, ∞}`.
    pub fn radiation(
        body: Arc<FloatingBody>,
        frequency: Frequency,
        radiating_dof: &str,
        env: &Environment,
    ) -> Result<Self, BemError> {
        let (omega, wavenumber, provided) = Self::resolve_frequency(frequency, env)?;
        Self::validate_environment(env)?;
        let displacement = body.dof(radiating_dof).ok_or_else(|| {
            BemError::Configuration(format!(
                "body '{}' has no degree of freedom named '{}' (available: {:?})",
                body.name(),
                radiating_dof,
                body.dof_names(),
            ))
        })?;

        let hull = body.mesh();
        let n_hull = hull.nb_faces();
        let n_total = n_hull + body.lid_mesh().map_or(0, |lid| lid.nb_faces());
        let normals = hull.normals();
        let mut normal_velocity = Array1::<Complex64>::zeros(n_total);
        for j in 0..n_hull {
            let nv = normals[[j, 0]] * displacement[[j, 0]]
                + normals[[j, 1]] * displacement[[j, 1]]
                + normals[[j, 2]] * displacement[[j, 2]];
            normal_velocity[j] = Complex64::new(nv, 0.0);
        }
        let minus_i_omega = SymbolicComplex::from_scalar(SymbolicScalar::from_omega(omega))
            .times(Complex64::new(0.0, -1.0));
        let boundary_condition = SymbolicVector::plain(normal_velocity).scale(minus_i_omega);

        Ok(Self {
            body,
            free_surface: env.free_surface,
            water_depth: env.water_depth,
            g: env.g,
            rho: env.rho,
            forward_speed: env.forward_speed,
            omega,
            wavenumber,
            provided_freq_type: provided,
            kind: ProblemKind::Radiation {
                radiating_dof: radiating_dof.to_string(),
            },
            boundary_condition,
        })
    }

    /// Build a diffraction problem under an incident Airy wave.
    ///
    /// The boundary condition is `−(u₀ · n)` over the hull faces and zero
    /// over the lid. A zero or infinite frequency is accepted here (with
    /// a placeholder boundary condition) and rejected by the solver, so
    /// that batch resolution can isolate it as a single failure.
    pub fn diffraction(
        body: Arc<FloatingBody>,
        frequency: Frequency,
        wave_direction: f64,
        env: &Environment,
    ) -> Result<Self, BemError> {
        let (omega, wavenumber, provided) = Self::resolve_frequency(frequency, env)?;
        Self::validate_environment(env)?;

        let hull = body.mesh();
        let n_hull = hull.nb_faces();
        let n_total = n_hull + body.lid_mesh().map_or(0, |lid| lid.nb_faces());
        let mut bc = Array1::<Complex64>::zeros(n_total);
        if omega != 0.0 && omega.is_finite() {
            let params = AiryParams {
                omega,
                wavenumber,
                water_depth: env.water_depth,
                free_surface: env.free_surface,
                g: env.g,
                wave_direction,
            };
            let velocity = airy_waves_velocity(hull.centers(), &params);
            let normals = hull.normals();
            for j in 0..n_hull {
                bc[j] = -(velocity[[j, 0]] * normals[[j, 0]]
                    + velocity[[j, 1]] * normals[[j, 1]]
                    + velocity[[j, 2]] * normals[[j, 2]]);
            }
        }

        Ok(Self {
            body,
            free_surface: env.free_surface,
            water_depth: env.water_depth,
            g: env.g,
            rho: env.rho,
            forward_speed: env.forward_speed,
            omega,
            wavenumber,
            provided_freq_type: provided,
            kind: ProblemKind::Diffraction { wave_direction },
            boundary_condition: SymbolicVector::plain(bc),
        })
    }

    fn resolve_frequency(
        frequency: Frequency,
        env: &Environment,
    ) -> Result<(f64, f64, FreqType), BemError> {
        let (omega, wavenumber, provided) = match frequency {
            Frequency::Omega(omega) => {
                let k = wavenumber_from_omega(omega, env.g, env.water_depth);
                (omega, k, FreqType::Omega)
            }
            Frequency::Period(period) => {
                let omega = if period.is_infinite() {
                    0.0
                } else if period == 0.0 {
                    f64::INFINITY
                } else {
                    2.0 * std::f64::consts::PI / period
                };
                let k = wavenumber_from_omega(omega, env.g, env.water_depth);
                (omega, k, FreqType::Period)
            }
            Frequency::Wavenumber(k) => {
                (omega_from_wavenumber(k, env.g, env.water_depth), k, FreqType::Wavenumber)
            }
            Frequency::Wavelength(lambda) => {
                let k = if lambda.is_infinite() {
                    0.0
                } else if lambda == 0.0 {
                    f64::INFINITY
                } else {
                    2.0 * std::f64::consts::PI / lambda
                };
                (omega_from_wavenumber(k, env.g, env.water_depth), k, FreqType::Wavelength)
            }
        };
        if omega.is_nan() || omega < 0.0 {
            return Err(BemError::Configuration(format!(
                "invalid frequency specification {frequency:?}"
            )));
        }
        Ok((omega, wavenumber, provided))
    }

    fn validate_environment(env: &Environment) -> Result<(), BemError> {
        if !(env.water_depth > 0.0) {
            return Err(BemError::Configuration(format!(
                "water depth must be positive, got {}",
                env.water_depth
            )));
        }
        if !(env.free_surface == 0.0 || env.free_surface.is_infinite()) {
            return Err(BemError::Configuration(format!(
                "free surface elevation must be 0.0 or +inf, got {}",
                env.free_surface
            )));
        }
        if env.free_surface.is_infinite() && env.water_depth.is_finite() {
            return Err(BemError::Configuration(
                "finite water depth without a free surface is not supported".to_string(),
            ));
        }
        if !(env.g > 0.0) || !(env.rho > 0.0) {
            return Err(BemError::Configuration(format!(
                "g and rho must be positive, got g = {}, rho = {}",
                env.g, env.rho
            )));
        }
        Ok(())
    }

    /// The body of the problem.
    pub fn body(&self) -> &Arc<FloatingBody> {
        &self.body
    }

    /// Free-surface elevation, `+∞` when there is no free surface.
    pub fn free_surface(&self) -> f64 {
        self.free_surface
    }

    /// Water depth.
    pub fn water_depth(&self) -> f64 {
        self.water_depth
    }

    /// Gravitational acceleration.
    pub fn g(&self) -> f64 {
        self.g
    }

    /// Fluid density.
    pub fn rho(&self) -> f64 {
        self.rho
    }

    /// Steady forward speed along +x.
    pub fn forward_speed(&self) -> f64 {
        self.forward_speed
    }

    /// Angular frequency ω.
    pub fn omega(&self) -> f64 {
        self.omega
    }

    /// Wavenumber from the dispersion relation.
    pub fn wavenumber(&self) -> f64 {
        self.wavenumber
    }

    /// Period `T = 2π/ω`.
    pub fn period(&self) -> f64 {
        2.0 * std::f64::consts::PI / self.omega
    }

    /// Wavelength `λ = 2π/k`.
    pub fn wavelength(&self) -> f64 {
        2.0 * std::f64::consts::PI / self.wavenumber
    }

    /// Which frequency convention the problem was built with.
    pub fn provided_freq_type(&self) -> FreqType {
        self.provided_freq_type
    }

    /// The frequency value in the convention the problem was built with.
    pub fn provided_freq_value(&self) -> f64 {
        match self.provided_freq_type {
            FreqType::Omega => self.omega,
            FreqType::Period => self.period(),
            FreqType::Wavenumber => self.wavenumber,
            FreqType::Wavelength => self.wavelength(),
        }
    }

    /// What drives the flow.
    pub fn kind(&self) -> &ProblemKind {
        &self.kind
    }

    /// Whether this is a diffraction problem.
    pub fn is_diffraction(&self) -> bool {
        matches!(self.kind, ProblemKind::Diffraction { .. })
    }

    /// Boundary condition over the lid-inclusive faces.
    pub fn boundary_condition(&self) -> &SymbolicVector {
        &self.boundary_condition
    }

    fn wave_direction_or_zero(&self) -> f64 {
        match self.kind {
            ProblemKind::Diffraction { wave_direction } => wave_direction,
            ProblemKind::Radiation { .. } => 0.0,
        }
    }

    /// Doppler-shifted driving frequency in the body frame,
    /// `ω_e = |ω − k U cos β|`.
    pub fn encounter_omega(&self) -> f64 {
        if self.forward_speed == 0.0 {
            return self.omega;
        }
        (self.omega
            - self.wavenumber * self.forward_speed * self.wave_direction_or_zero().cos())
        .abs()
    }

    /// Wavenumber re-solved from the dispersion relation at the encounter
    /// frequency.
    pub fn encounter_wavenumber(&self) -> f64 {
        if self.forward_speed == 0.0 {
            return self.wavenumber;
        }
        wavenumber_from_omega(self.encounter_omega(), self.g, self.water_depth)
    }

    /// Frequency pair actually driving the linear system: the encounter
    /// frame with forward speed, the problem's own frame otherwise.
    pub fn solving_frequencies(&self) -> (f64, f64) {
        (self.encounter_omega(), self.encounter_wavenumber())
    }

    fn kind_rank(&self) -> u8 {
        match self.kind {
            ProblemKind::Radiation { .. } => 0,
            ProblemKind::Diffraction { .. } => 1,
        }
    }
}

impl PartialEq for Problem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Problem {}

impl PartialOrd for Problem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Problem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.body
            .name()
            .cmp(other.body.name())
            .then_with(|| self.free_surface.total_cmp(&other.free_surface))
            .then_with(|| self.water_depth.total_cmp(&other.water_depth))
            .then_with(|| self.omega.total_cmp(&other.omega))
            .then_with(|| self.forward_speed.total_cmp(&other.forward_speed))
            .then_with(|| self.kind_rank().cmp(&other.kind_rank()))
            .then_with(|| match (&self.kind, &other.kind) {
                (
                    ProblemKind::Radiation { radiating_dof: a },
                    ProblemKind::Radiation { radiating_dof: b },
                ) => a.cmp(b),
                (
                    ProblemKind::Diffraction { wave_direction: a },
                    ProblemKind::Diffraction { wave_direction: b },
                ) => a.total_cmp(b),
                _ => Ordering::Equal,
            })
    }
}

/// Partition a batch into groups sharing their influence matrices.
///
/// The batch is sorted, then split on changes of (body, water depth, ω).
/// Problems inside a group differ only by boundary condition, so a group
/// solved sequentially reuses its matrices.
pub fn group_for_parallel_resolution(mut problems: Vec<Arc<Problem>>) -> Vec<Vec<Arc<Problem>>> {
    problems.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));
    let mut groups: Vec<Vec<Arc<Problem>>> = Vec::new();
    for problem in problems {
        let same_group = groups.last().and_then(|g| g.last()).is_some_and(|last| {
            last.body.name() == problem.body.name()
                && last.water_depth.total_cmp(&problem.water_depth) == Ordering::Equal
                && last.omega.total_cmp(&problem.omega) == Ordering::Equal
        });
        match groups.last_mut() {
            Some(group) if same_group => group.push(problem),
            _ => groups.push(vec![problem]),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::sphere_mesh;
    use approx::assert_relative_eq;

    fn test_body() -> Arc<FloatingBody> {
        let mesh = sphere_mesh("sphere", 1.0, [0.0, 0.0, -2.0], 6, 8);
        let mut body = FloatingBody::new("sphere", mesh);
        body.add_all_translation_dofs();
        Arc::new(body)
    }

    #[test]
    fn test_dispersion_deep_water() {
        let k = wavenumber_from_omega(1.5, 9.81, f64::INFINITY);
        assert_relative_eq!(k, 1.5 * 1.5 / 9.81, epsilon = 1e-12);
    }

    #[test]
    fn test_dispersion_finite_depth_roundtrip() {
        let (g, h) = (9.81, 5.0);
        for omega in [0.3, 1.0, 2.5] {
            let k = wavenumber_from_omega(omega, g, h);
            assert_relative_eq!(g * k * (k * h).tanh(), omega * omega, epsilon = 1e-8);
            assert_relative_eq!(omega_from_wavenumber(k, g, h), omega, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_dispersion_symbolic_endpoints() {
        assert_eq!(wavenumber_from_omega(0.0, 9.81, f64::INFINITY), 0.0);
        assert!(wavenumber_from_omega(f64::INFINITY, 9.81, 10.0).is_infinite());
    }

    #[test]
    fn test_radiation_boundary_condition_is_normal_velocity() {
        let body = test_body();
        let omega = 1.3;
        let problem = Problem::radiation(
            body.clone(),
            Frequency::Omega(omega),
            "Heave",
            &Environment::default(),
        )
        .unwrap();
        let bc = problem.boundary_condition();
        assert_eq!(bc.exponent(), 0);
        let normals = body.mesh().normals();
        for j in 0..body.mesh().nb_faces() {
            let expected = Complex64::new(0.0, -omega) * normals[[j, 2]];
            assert_relative_eq!(bc.values()[j].re, expected.re, epsilon = 1e-12);
            assert_relative_eq!(bc.values()[j].im, expected.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zero_frequency_radiation_is_symbolic() {
        let problem = Problem::radiation(
            test_body(),
            Frequency::Omega(0.0),
            "Surge",
            &Environment::default(),
        )
        .unwrap();
        assert_eq!(problem.boundary_condition().exponent(), 1);
        let problem = Problem::radiation(
            test_body(),
            Frequency::Omega(f64::INFINITY),
            "Surge",
            &Environment::default(),
        )
        .unwrap();
        assert_eq!(problem.boundary_condition().exponent(), -1);
    }

    #[test]
    fn test_unknown_dof_is_rejected() {
        let err = Problem::radiation(
            test_body(),
            Frequency::Omega(1.0),
            "Yaw",
            &Environment::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BemError::Configuration(_)));
    }

    #[test]
    fn test_frequency_conventions_agree() {
        let env = Environment::default();
        let body = test_body();
        let omega = 1.1;
        let by_omega =
            Problem::radiation(body.clone(), Frequency::Omega(omega), "Heave", &env).unwrap();
        let by_period = Problem::radiation(
            body.clone(),
            Frequency::Period(2.0 * std::f64::consts::PI / omega),
            "Heave",
            &env,
        )
        .unwrap();
        let by_wavenumber = Problem::radiation(
            body,
            Frequency::Wavenumber(omega * omega / 9.81),
            "Heave",
            &env,
        )
        .unwrap();
        assert_relative_eq!(by_period.omega(), omega, epsilon = 1e-12);
        assert_relative_eq!(by_wavenumber.omega(), omega, epsilon = 1e-12);
        assert_eq!(by_omega.provided_freq_type(), FreqType::Omega);
        assert_eq!(by_period.provided_freq_type(), FreqType::Period);
        assert_eq!(by_wavenumber.provided_freq_type(), FreqType::Wavenumber);
    }

    #[test]
    fn test_encounter_frequency_doppler_shift() {
        let env = Environment {
            forward_speed: 2.0,
            ..Environment::default()
        };
        let problem =
            Problem::diffraction(test_body(), Frequency::Omega(1.2), 0.0, &env).unwrap();
        let expected = (1.2 - problem.wavenumber() * 2.0).abs();
        assert_relative_eq!(problem.encounter_omega(), expected, epsilon = 1e-12);
        // Head seas lower the apparent wavenumber as well.
        assert!(problem.encounter_wavenumber() < problem.wavenumber());
    }

    #[test]
    fn test_ordering_groups_by_frequency() {
        let env = Environment::default();
        let body = test_body();
        let p1 =
            Problem::radiation(body.clone(), Frequency::Omega(2.0), "Heave", &env).unwrap();
        let p2 =
            Problem::radiation(body.clone(), Frequency::Omega(1.0), "Surge", &env).unwrap();
        let p3 = Problem::diffraction(body.clone(), Frequency::Omega(1.0), 0.0, &env).unwrap();
        let p4 = Problem::radiation(body, Frequency::Omega(1.0), "Heave", &env).unwrap();
        let mut batch = vec![p1.clone(), p2.clone(), p3.clone(), p4.clone()];
        batch.sort();
        assert_eq!(batch, vec![p4.clone(), p2.clone(), p3.clone(), p1.clone()]);

        let groups = group_for_parallel_resolution(
            [p1, p2, p3, p4].into_iter().map(Arc::new).collect(),
        );
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 3);
        assert_eq!(groups[1].len(), 1);
    }

    #[test]
    fn test_diffraction_bc_opposes_incident_flow() {
        let env = Environment::default();
        let problem =
            Problem::diffraction(test_body(), Frequency::Omega(1.0), 0.0, &env).unwrap();
        let bc = problem.boundary_condition();
        assert_eq!(bc.exponent(), 0);
        assert!(bc.values().iter().any(|v| v.norm() > 0.0));
    }

    #[test]
    fn test_invalid_environment_is_rejected() {
        let env = Environment {
            water_depth: -3.0,
            ..Environment::default()
        };
        let err =
            Problem::radiation(test_body(), Frequency::Omega(1.0), "Heave", &env).unwrap_err();
        assert!(matches!(err, BemError::Configuration(_)));
    }
}
