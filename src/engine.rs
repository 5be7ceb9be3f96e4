//! Matrix engine: influence-matrix assembly and linear solves
//!
//! The engine turns mesh pairs and a Green's function into dense
//! boundary-integral operators and solves the resulting systems.
//! [`BasicMatrixEngine`] is the built-in dense implementation: one-point
//! collocation assembly through [`GreenFunction::evaluate`], the
//! half-identity jump term when both meshes are the same discretisation,
//! and LU factorization with partial pivoting as the linear solver.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use num_traits::Zero;

use crate::error::BemError;
use crate::green::{GreenFunction, KernelGradient};
use crate::mesh::Mesh;
use crate::symbolic::SymbolicVector;

/// Builds boundary-integral matrices and solves linear systems.
pub trait MatrixEngine: Send + Sync {
    /// Assemble the single-layer matrix `S` and the double-layer matrix
    /// over `mesh_i`'s collocation points against `mesh_j`'s panels.
    ///
    /// With `adjoint_double_layer` the second matrix is the adjoint
    /// operator `K` (normal derivative at the collocation point), used
    /// by the indirect source formulation; otherwise it is the plain
    /// double-layer operator `D` used by the direct formulation. Both
    /// include the `+½ I` jump term when the two meshes coincide.
    fn build_matrices(
        &self,
        mesh_i: &Mesh,
        mesh_j: &Mesh,
        free_surface: f64,
        water_depth: f64,
        wavenumber: f64,
        green_function: &dyn GreenFunction,
        adjoint_double_layer: bool,
    ) -> Result<(Array2<Complex64>, Array2<Complex64>), BemError>;

    /// Assemble only the single-layer matrix between two meshes.
    fn build_s_matrix(
        &self,
        mesh_i: &Mesh,
        mesh_j: &Mesh,
        free_surface: f64,
        water_depth: f64,
        wavenumber: f64,
        green_function: &dyn GreenFunction,
    ) -> Result<Array2<Complex64>, BemError>;

    /// Solve the dense system `A x = b`.
    fn linear_solver(
        &self,
        a: &Array2<Complex64>,
        b: &Array1<Complex64>,
    ) -> Result<Array1<Complex64>, BemError>;

    /// Engine name, used in engine-contract error messages.
    fn name(&self) -> &str;

    /// Settings to stamp on exported datasets.
    fn exportable_settings(&self) -> BTreeMap<String, String>;
}

/// Adapter letting the engine's linear solver accept right-hand sides
/// carrying a symbolic zero/infinity prefactor: the prefactor is
/// stripped, the plain system solved, and the prefactor reapplied to the
/// solution. Composed explicitly at the call site instead of wrapping
/// the method itself.
pub fn solve_supporting_symbolic(
    engine: &dyn MatrixEngine,
    a: &Array2<Complex64>,
    b: &SymbolicVector,
) -> Result<SymbolicVector, BemError> {
    let x = engine.linear_solver(a, b.values())?;
    Ok(SymbolicVector::with_exponent(b.exponent(), x))
}

/// The built-in dense matrix engine.
#[derive(Debug, Clone, Default)]
pub struct BasicMatrixEngine;

impl BasicMatrixEngine {
    /// Create the engine.
    pub fn new() -> Self {
        Self
    }
}

impl MatrixEngine for BasicMatrixEngine {
    fn build_matrices(
        &self,
        mesh_i: &Mesh,
        mesh_j: &Mesh,
        free_surface: f64,
        water_depth: f64,
        wavenumber: f64,
        green_function: &dyn GreenFunction,
        adjoint_double_layer: bool,
    ) -> Result<(Array2<Complex64>, Array2<Complex64>), BemError> {
        let (s, mut second) = if adjoint_double_layer {
            let (s, gradient) = green_function.evaluate(
                mesh_i.centers(),
                mesh_j,
                free_surface,
                water_depth,
                wavenumber,
                false,
            )?;
            let KernelGradient::Full(grad) = gradient else {
                return Err(BemError::Solver(
                    "green function did not return a full gradient".to_string(),
                ));
            };
            // Adjoint operator: normal derivative at the collocation
            // point, K_ij = ∇G(x_i, ξ_j) · n_i.
            let m = mesh_i.nb_faces();
            let n = mesh_j.nb_faces();
            let normals = mesh_i.normals();
            let mut k = Array2::<Complex64>::zeros((m, n));
            for i in 0..m {
                for j in 0..n {
                    let mut v = Complex64::zero();
                    for a in 0..3 {
                        v += grad[[i, j, a]] * normals[[i, a]];
                    }
                    k[[i, j]] = v;
                }
            }
            (s, k)
        } else {
            let (s, gradient) = green_function.evaluate(
                mesh_i.centers(),
                mesh_j,
                free_surface,
                water_depth,
                wavenumber,
                true,
            )?;
            let KernelGradient::Contracted(d) = gradient else {
                return Err(BemError::Solver(
                    "green function did not return a contracted gradient".to_string(),
                ));
            };
            (s, d)
        };

        if mesh_i.same_discretisation(mesh_j) {
            let half = Complex64::new(0.5, 0.0);
            for i in 0..mesh_i.nb_faces() {
                second[[i, i]] += half;
            }
        }

        Ok((s, second))
    }

    fn build_s_matrix(
        &self,
        mesh_i: &Mesh,
        mesh_j: &Mesh,
        free_surface: f64,
        water_depth: f64,
        wavenumber: f64,
        green_function: &dyn GreenFunction,
    ) -> Result<Array2<Complex64>, BemError> {
        let (s, _) = green_function.evaluate(
            mesh_i.centers(),
            mesh_j,
            free_surface,
            water_depth,
            wavenumber,
            true,
        )?;
        Ok(s)
    }

    fn linear_solver(
        &self,
        a: &Array2<Complex64>,
        b: &Array1<Complex64>,
    ) -> Result<Array1<Complex64>, BemError> {
        lu_solve(a, b)
    }

    fn name(&self) -> &str {
        "BasicMatrixEngine"
    }

    fn exportable_settings(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("engine".to_string(), "BasicMatrixEngine".to_string())])
    }
}

/// LU factorization with partial pivoting for dense complex systems.
struct LuFactorization {
    lu: Array2<Complex64>,
    pivots: Vec<usize>,
    n: usize,
}

fn lu_factorize(a: &Array2<Complex64>) -> Result<LuFactorization, BemError> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(BemError::Solver(format!(
            "matrix must be square, got {}x{}",
            n,
            a.ncols()
        )));
    }

    let mut lu = a.clone();
    let mut pivots: Vec<usize> = (0..n).collect();

    for k in 0..n {
        let mut max_val = lu[[k, k]].norm();
        let mut max_row = k;
        for i in (k + 1)..n {
            let val = lu[[i, k]].norm();
            if val > max_val {
                max_val = val;
                max_row = i;
            }
        }

        if max_val < 1e-30 {
            return Err(BemError::Solver(
                "matrix is singular or nearly singular".to_string(),
            ));
        }

        if max_row != k {
            for j in 0..n {
                let tmp = lu[[k, j]];
                lu[[k, j]] = lu[[max_row, j]];
                lu[[max_row, j]] = tmp;
            }
            pivots.swap(k, max_row);
        }

        let pivot = lu[[k, k]];
        for i in (k + 1)..n {
            let mult = lu[[i, k]] / pivot;
            lu[[i, k]] = mult;
            for j in (k + 1)..n {
                let update = mult * lu[[k, j]];
                lu[[i, j]] -= update;
            }
        }
    }

    Ok(LuFactorization { lu, pivots, n })
}

fn lu_solve(a: &Array2<Complex64>, b: &Array1<Complex64>) -> Result<Array1<Complex64>, BemError> {
    let f = lu_factorize(a)?;
    if b.len() != f.n {
        return Err(BemError::Solver(format!(
            "dimension mismatch: matrix is {}x{}, rhs has length {}",
            f.n,
            f.n,
            b.len()
        )));
    }

    let mut x = b.clone();

    // Apply row permutations.
    for i in 0..f.n {
        let pivot = f.pivots[i];
        if pivot != i {
            x.swap(i, pivot);
        }
    }

    // Forward substitution with the unit lower triangle.
    for i in 0..f.n {
        for j in 0..i {
            let l_ij = f.lu[[i, j]];
            let update = l_ij * x[j];
            x[i] -= update;
        }
    }

    // Backward substitution with the upper triangle.
    for i in (0..f.n).rev() {
        for j in (i + 1)..f.n {
            let u_ij = f.lu[[i, j]];
            let update = u_ij * x[j];
            x[i] -= update;
        }
        let u_ii = f.lu[[i, i]];
        if u_ii.norm() < 1e-30 {
            return Err(BemError::Solver(
                "matrix is singular or nearly singular".to_string(),
            ));
        }
        x[i] /= u_ii;
    }

    Ok(x)
}
