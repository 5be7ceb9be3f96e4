//! Airy incident-wave kinematics
//!
//! Linear regular-wave fields used to build diffraction boundary
//! conditions: `Φ₀ = -i g/ω · cosh(k(z+h))/cosh(kh) · e^{ik(x cosβ + y sinβ)}`
//! in finite depth, with the usual `e^{kz}` deep-water limit.

use ndarray::{Array1, Array2};
use num_complex::Complex64;

/// Physical parameters of an incident Airy wave.
#[derive(Debug, Clone, Copy)]
pub struct AiryParams {
    /// Angular frequency (rad/s), finite and nonzero.
    pub omega: f64,
    /// Wavenumber from the dispersion relation.
    pub wavenumber: f64,
    /// Water depth, possibly infinite.
    pub water_depth: f64,
    /// Free-surface elevation level.
    pub free_surface: f64,
    /// Gravitational acceleration.
    pub g: f64,
    /// Propagation direction (rad, 0 = +x).
    pub wave_direction: f64,
}

impl AiryParams {
    /// Depth profile `cosh(k(z+h))/cosh(kh)` and its vertical derivative
    /// divided by k, `sinh(k(z+h))/cosh(kh)`, with the deep-water limit
    /// `e^{kz}` for both when the depth is effectively infinite.
    fn depth_profile(&self, z: f64) -> (f64, f64) {
        let k = self.wavenumber;
        let h = self.water_depth;
        if h.is_infinite() || k * h > 20.0 {
            let e = (k * z).exp();
            (e, e)
        } else {
            let c = (k * h).cosh();
            (((k * (z + h)).cosh()) / c, ((k * (z + h)).sinh()) / c)
        }
    }

    fn horizontal_phase(&self, x: f64, y: f64) -> Complex64 {
        let k = self.wavenumber;
        let phase = k * (x * self.wave_direction.cos() + y * self.wave_direction.sin());
        Complex64::new(0.0, phase).exp()
    }
}

/// Incident-wave velocity potential at the given points, `(n,)`.
pub fn airy_waves_potential(points: &Array2<f64>, params: &AiryParams) -> Array1<Complex64> {
    let n = points.nrows();
    let amp = Complex64::new(0.0, -params.g / params.omega);
    let mut phi = Array1::zeros(n);
    for i in 0..n {
        let z = points[[i, 2]] - params.free_surface;
        let (profile, _) = params.depth_profile(z);
        phi[i] = amp * profile * params.horizontal_phase(points[[i, 0]], points[[i, 1]]);
    }
    phi
}

/// Incident-wave fluid velocity at the given points, `(n, 3)`.
pub fn airy_waves_velocity(points: &Array2<f64>, params: &AiryParams) -> Array2<Complex64> {
    let n = points.nrows();
    let k = params.wavenumber;
    let amp = Complex64::new(0.0, -params.g / params.omega);
    let ik = Complex64::new(0.0, k);
    let (cb, sb) = (params.wave_direction.cos(), params.wave_direction.sin());
    let mut velocity = Array2::zeros((n, 3));
    for i in 0..n {
        let z = points[[i, 2]] - params.free_surface;
        let (profile, vertical) = params.depth_profile(z);
        let base = amp * params.horizontal_phase(points[[i, 0]], points[[i, 1]]);
        velocity[[i, 0]] = base * profile * ik * cb;
        velocity[[i, 1]] = base * profile * ik * sb;
        velocity[[i, 2]] = base * vertical * k;
    }
    velocity
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn deep_params() -> AiryParams {
        AiryParams {
            omega: 1.5,
            wavenumber: 1.5 * 1.5 / 9.81,
            water_depth: f64::INFINITY,
            free_surface: 0.0,
            g: 9.81,
            wave_direction: 0.0,
        }
    }

    #[test]
    fn test_potential_decays_with_depth() {
        let params = deep_params();
        let points = array![[0.0, 0.0, -0.5], [0.0, 0.0, -5.0]];
        let phi = airy_waves_potential(&points, &params);
        assert!(phi[0].norm() > phi[1].norm());
    }

    #[test]
    fn test_velocity_is_potential_gradient() {
        // Finite differences of the potential reproduce the velocity.
        let params = deep_params();
        let p0 = [1.0, -0.3, -1.2];
        let eps = 1e-6;
        let v = airy_waves_velocity(&array![[p0[0], p0[1], p0[2]]], &params);
        for axis in 0..3 {
            let mut pa = p0;
            let mut pb = p0;
            pa[axis] -= eps;
            pb[axis] += eps;
            let phi = airy_waves_potential(
                &array![[pa[0], pa[1], pa[2]], [pb[0], pb[1], pb[2]]],
                &params,
            );
            let fd = (phi[1] - phi[0]) / (2.0 * eps);
            assert_relative_eq!(fd.re, v[[0, axis]].re, epsilon = 1e-5);
            assert_relative_eq!(fd.im, v[[0, axis]].im, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_finite_depth_bottom_condition() {
        // No flow through the sea bottom.
        let params = AiryParams {
            omega: 1.0,
            wavenumber: 0.15,
            water_depth: 10.0,
            free_surface: 0.0,
            g: 9.81,
            wave_direction: 0.7,
        };
        let v = airy_waves_velocity(&array![[0.0, 0.0, -10.0]], &params);
        assert_relative_eq!(v[[0, 2]].norm(), 0.0, epsilon = 1e-12);
    }
}
