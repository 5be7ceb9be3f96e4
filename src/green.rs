//! Green's function evaluation
//!
//! The solver talks to its kernel through the [`GreenFunction`] trait:
//! given query points and a source mesh, the kernel returns single-layer
//! influence coefficients and either the raw gradient of the kernel at
//! the query points or the gradient contracted with the source-panel
//! normals ("early dot product", the double-layer kernel).
//!
//! The built-in [`RankineGreenFunction`] uses the free-space kernel
//! `G = -1/(4πr)` with one-point panel quadrature and an analytic
//! flat-panel self-term. The free surface is handled by mirror images:
//! the rigid-wall (positive image) limit at zero wavenumber and the
//! high-frequency (negative image) limit otherwise. The trait is the
//! seam where a full finite-wavenumber wave kernel plugs in.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use ndarray::{Array2, Array3};
use num_complex::Complex64;

use crate::error::BemError;
use crate::mesh::Mesh;

/// Gradient output of a kernel evaluation.
#[derive(Debug, Clone)]
pub enum KernelGradient {
    /// Gradient contracted with the source-panel normals: the
    /// double-layer kernel `∫ ∂G/∂n_ξ dS`, shape `(nb_points, nb_faces)`.
    Contracted(Array2<Complex64>),
    /// Raw gradient with respect to the query point, shape
    /// `(nb_points, nb_faces, 3)`.
    Full(Array3<Complex64>),
}

/// A Green's function evaluator.
pub trait GreenFunction: Send + Sync {
    /// Influence coefficients between query points and a source mesh.
    ///
    /// Returns the single-layer matrix `S` of shape
    /// `(nb_points, nb_faces)` and the kernel gradient, contracted with
    /// the source normals when `early_dot_product` is set.
    fn evaluate(
        &self,
        points: &Array2<f64>,
        mesh: &Mesh,
        free_surface: f64,
        water_depth: f64,
        wavenumber: f64,
        early_dot_product: bool,
    ) -> Result<(Array2<Complex64>, KernelGradient), BemError>;

    /// Settings to stamp on exported datasets.
    fn exportable_settings(&self) -> BTreeMap<String, String>;
}

/// Free-surface handling regime of the Rankine kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MirrorRegime {
    /// No free surface: plain free-space kernel.
    None,
    /// Zero wavenumber: positive image (`∂φ/∂z = 0` on the plane).
    PositiveImage,
    /// Finite or infinite wavenumber: negative image (`φ = 0` on the
    /// plane, the high-frequency limit of the wave term).
    NegativeImage,
}

/// Rankine-source kernel with free-surface mirror images.
#[derive(Debug, Clone, Default)]
pub struct RankineGreenFunction;

/// `∫ 1/r dS / (4π)` over a unit-area flat square panel, used as the
/// analytic self-term after scaling by `sqrt(area)`.
fn flat_panel_self_coefficient() -> f64 {
    4.0 * (1.0 + 2.0_f64.sqrt()).ln() / (4.0 * PI)
}

impl RankineGreenFunction {
    /// Create the kernel.
    pub fn new() -> Self {
        Self
    }

    fn regime(free_surface: f64, wavenumber: f64) -> MirrorRegime {
        if free_surface.is_infinite() {
            MirrorRegime::None
        } else if wavenumber == 0.0 {
            MirrorRegime::PositiveImage
        } else {
            MirrorRegime::NegativeImage
        }
    }
}

impl GreenFunction for RankineGreenFunction {
    fn evaluate(
        &self,
        points: &Array2<f64>,
        mesh: &Mesh,
        free_surface: f64,
        _water_depth: f64,
        wavenumber: f64,
        early_dot_product: bool,
    ) -> Result<(Array2<Complex64>, KernelGradient), BemError> {
        if points.ncols() != 3 {
            return Err(BemError::InvalidMesh(
                "query points must be a (n, 3) array".to_string(),
            ));
        }
        let m = points.nrows();
        let n = mesh.nb_faces();
        let centers = mesh.centers();
        let normals = mesh.normals();
        let areas = mesh.areas();
        let regime = Self::regime(free_surface, wavenumber);
        let self_coeff = flat_panel_self_coefficient();

        let mut s = Array2::<Complex64>::zeros((m, n));
        // Gradients of the direct and image terms are kept apart: the
        // source-side derivative of the image term flips its z component.
        let mut grad_direct = Array3::<f64>::zeros((m, n, 3));
        let mut grad_image = Array3::<f64>::zeros((m, n, 3));

        for i in 0..m {
            for j in 0..n {
                let area = areas[j];
                let dx = [
                    points[[i, 0]] - centers[[j, 0]],
                    points[[i, 1]] - centers[[j, 1]],
                    points[[i, 2]] - centers[[j, 2]],
                ];
                let r = (dx[0] * dx[0] + dx[1] * dx[1] + dx[2] * dx[2]).sqrt();
                let mut s_ij = if r < 1e-10 {
                    // Coincident point: analytic flat-panel self-term,
                    // zero principal-value gradient.
                    -self_coeff * area.sqrt()
                } else {
                    let inv = 1.0 / (4.0 * PI * r);
                    for a in 0..3 {
                        grad_direct[[i, j, a]] = area * dx[a] * inv / (r * r);
                    }
                    -area * inv
                };

                if regime != MirrorRegime::None {
                    let sign = if regime == MirrorRegime::PositiveImage {
                        1.0
                    } else {
                        -1.0
                    };
                    let mirrored_z = 2.0 * free_surface - centers[[j, 2]];
                    let dxi = [
                        points[[i, 0]] - centers[[j, 0]],
                        points[[i, 1]] - centers[[j, 1]],
                        points[[i, 2]] - mirrored_z,
                    ];
                    let ri = (dxi[0] * dxi[0] + dxi[1] * dxi[1] + dxi[2] * dxi[2]).sqrt();
                    if ri < 1e-10 {
                        // Panel lying on the free surface plane.
                        s_ij += sign * (-self_coeff * area.sqrt());
                    } else {
                        let inv = 1.0 / (4.0 * PI * ri);
                        for a in 0..3 {
                            grad_image[[i, j, a]] = sign * area * dxi[a] * inv / (ri * ri);
                        }
                        s_ij += sign * (-area * inv);
                    }
                }

                s[[i, j]] = Complex64::new(s_ij, 0.0);
            }
        }

        let gradient = if early_dot_product {
            // Double-layer kernel: gradient with respect to the source
            // point dotted with the source normal. The source-side
            // gradient of the direct term is the opposite of the
            // query-side one; the image term additionally flips z.
            let mut contracted = Array2::<Complex64>::zeros((m, n));
            for i in 0..m {
                for j in 0..n {
                    let mut v = 0.0;
                    for a in 0..3 {
                        let flip = if a == 2 { -1.0 } else { 1.0 };
                        v -= grad_direct[[i, j, a]] * normals[[j, a]];
                        v -= grad_image[[i, j, a]] * flip * normals[[j, a]];
                    }
                    contracted[[i, j]] = Complex64::new(v, 0.0);
                }
            }
            KernelGradient::Contracted(contracted)
        } else {
            let mut full = Array3::<Complex64>::zeros((m, n, 3));
            for i in 0..m {
                for j in 0..n {
                    for a in 0..3 {
                        full[[i, j, a]] =
                            Complex64::new(grad_direct[[i, j, a]] + grad_image[[i, j, a]], 0.0);
                    }
                }
            }
            KernelGradient::Full(full)
        };

        Ok((s, gradient))
    }

    fn exportable_settings(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(
            "green_function".to_string(),
            "RankineGreenFunction".to_string(),
        )])
    }
}
