//! Normalization of field-evaluation point specifications
//!
//! Field evaluation accepts a single point, a flat list of points, a
//! cartesian grid, or a mesh. All of them are normalized to one flat
//! `(n, 3)` array plus a shape descriptor used to fold the flat output
//! back into the caller's convention.

use ndarray::{Array, Array1, Array2, ArrayD, IxDyn};
use num_complex::Complex64;

use crate::error::BemError;
use crate::mesh::Mesh;

/// Where to evaluate a field.
#[derive(Debug, Clone)]
pub enum PointsSpec<'a> {
    /// One point.
    Point([f64; 3]),
    /// A flat list of points, shape `(n, 3)`.
    Points(Array2<f64>),
    /// A cartesian product grid of coordinates.
    Grid {
        /// x coordinates.
        x: Vec<f64>,
        /// y coordinates.
        y: Vec<f64>,
        /// z coordinates.
        z: Vec<f64>,
    },
    /// The face centers of a mesh.
    Mesh(&'a Mesh),
}

/// Horizontal-only variant for free-surface elevation, lifted to the
/// free-surface plane during normalization.
#[derive(Debug, Clone)]
pub enum FreeSurfacePointsSpec<'a> {
    /// One horizontal point.
    Point([f64; 2]),
    /// A flat list of horizontal points, shape `(n, 2)`.
    Points(Array2<f64>),
    /// A cartesian product grid of horizontal coordinates.
    Grid {
        /// x coordinates.
        x: Vec<f64>,
        /// y coordinates.
        y: Vec<f64>,
    },
    /// The face centers of a mesh, x and y only.
    Mesh(&'a Mesh),
}

/// Output-shape convention recorded during normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputShape {
    /// A single point: scalar output (0-dimensional array).
    Scalar,
    /// A flat list of `n` points.
    Flat(usize),
    /// A 3D grid, `(nx, ny, nz)`.
    Grid3(usize, usize, usize),
    /// A 2D horizontal grid, `(nx, ny)`.
    Grid2(usize, usize),
    /// Mesh faces, one value per face.
    MeshFaces(usize),
}

impl OutputShape {
    fn dims(&self) -> Vec<usize> {
        match self {
            OutputShape::Scalar => vec![],
            OutputShape::Flat(n) | OutputShape::MeshFaces(n) => vec![*n],
            OutputShape::Grid3(nx, ny, nz) => vec![*nx, *ny, *nz],
            OutputShape::Grid2(nx, ny) => vec![*nx, *ny],
        }
    }

    /// Number of evaluation points the shape folds.
    pub fn nb_points(&self) -> usize {
        self.dims().iter().product()
    }

    /// Fold a flat complex output back into the caller's convention.
    pub fn fold(&self, flat: Array1<Complex64>) -> Result<ArrayD<Complex64>, BemError> {
        let dims = self.dims();
        Array::from_shape_vec(IxDyn(&dims), flat.to_vec()).map_err(|e| {
            BemError::Solver(format!("field output does not match point shape: {e}"))
        })
    }

    /// Fold a flat 3-vector-valued output, appending a trailing axis of
    /// length 3.
    pub fn fold_vectors(&self, flat: Array2<Complex64>) -> Result<ArrayD<Complex64>, BemError> {
        let mut dims = self.dims();
        dims.push(3);
        let values: Vec<Complex64> = flat.iter().copied().collect();
        Array::from_shape_vec(IxDyn(&dims), values).map_err(|e| {
            BemError::Solver(format!("field output does not match point shape: {e}"))
        })
    }
}

impl PointsSpec<'_> {
    /// Flatten to an `(n, 3)` point array and the shape to fold back to.
    pub fn normalize(&self) -> Result<(Array2<f64>, OutputShape), BemError> {
        match self {
            PointsSpec::Point(p) => {
                let mut points = Array2::zeros((1, 3));
                points.row_mut(0).assign(&ndarray::arr1(p));
                Ok((points, OutputShape::Scalar))
            }
            PointsSpec::Points(points) => {
                if points.ncols() != 3 {
                    return Err(BemError::Configuration(format!(
                        "expected points of shape (n, 3), got (n, {})",
                        points.ncols()
                    )));
                }
                Ok((points.clone(), OutputShape::Flat(points.nrows())))
            }
            PointsSpec::Grid { x, y, z } => {
                let (nx, ny, nz) = (x.len(), y.len(), z.len());
                let mut points = Array2::zeros((nx * ny * nz, 3));
                let mut row = 0;
                for &xi in x {
                    for &yi in y {
                        for &zi in z {
                            points[[row, 0]] = xi;
                            points[[row, 1]] = yi;
                            points[[row, 2]] = zi;
                            row += 1;
                        }
                    }
                }
                Ok((points, OutputShape::Grid3(nx, ny, nz)))
            }
            PointsSpec::Mesh(mesh) => Ok((
                mesh.centers().clone(),
                OutputShape::MeshFaces(mesh.nb_faces()),
            )),
        }
    }
}

impl FreeSurfacePointsSpec<'_> {
    /// Flatten to an `(n, 3)` point array on the plane `z = free_surface`
    /// and the shape to fold back to.
    pub fn normalize(&self, free_surface: f64) -> Result<(Array2<f64>, OutputShape), BemError> {
        match self {
            FreeSurfacePointsSpec::Point(p) => {
                let mut points = Array2::zeros((1, 3));
                points[[0, 0]] = p[0];
                points[[0, 1]] = p[1];
                points[[0, 2]] = free_surface;
                Ok((points, OutputShape::Scalar))
            }
            FreeSurfacePointsSpec::Points(horizontal) => {
                if horizontal.ncols() != 2 {
                    return Err(BemError::Configuration(format!(
                        "expected free-surface points of shape (n, 2), got (n, {})",
                        horizontal.ncols()
                    )));
                }
                let n = horizontal.nrows();
                let mut points = Array2::zeros((n, 3));
                for i in 0..n {
                    points[[i, 0]] = horizontal[[i, 0]];
                    points[[i, 1]] = horizontal[[i, 1]];
                    points[[i, 2]] = free_surface;
                }
                Ok((points, OutputShape::Flat(n)))
            }
            FreeSurfacePointsSpec::Grid { x, y } => {
                let (nx, ny) = (x.len(), y.len());
                let mut points = Array2::zeros((nx * ny, 3));
                let mut row = 0;
                for &xi in x {
                    for &yi in y {
                        points[[row, 0]] = xi;
                        points[[row, 1]] = yi;
                        points[[row, 2]] = free_surface;
                        row += 1;
                    }
                }
                Ok((points, OutputShape::Grid2(nx, ny)))
            }
            FreeSurfacePointsSpec::Mesh(mesh) => {
                let centers = mesh.centers();
                let n = mesh.nb_faces();
                let mut points = Array2::zeros((n, 3));
                for i in 0..n {
                    points[[i, 0]] = centers[[i, 0]];
                    points[[i, 1]] = centers[[i, 1]];
                    points[[i, 2]] = free_surface;
                }
                Ok((points, OutputShape::MeshFaces(n)))
            }
        }
    }
}
