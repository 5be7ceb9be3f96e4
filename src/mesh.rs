//! Collocation panel meshes
//!
//! A mesh is the face-level data the solver needs: panel centers, unit
//! normals, areas and radiuses (the radius of a face is the largest
//! distance from its center to one of its vertices, used by the
//! mesh-resolution diagnostic). Vertices are consumed by the generators
//! and not retained.

use ndarray::{Array1, Array2};

use crate::error::BemError;

/// A collocation mesh: one panel per face.
#[derive(Debug, Clone)]
pub struct Mesh {
    name: String,
    centers: Array2<f64>,
    normals: Array2<f64>,
    areas: Array1<f64>,
    radiuses: Array1<f64>,
}

impl Mesh {
    /// Build a mesh from per-face data.
    ///
    /// `centers` and `normals` must be `(n, 3)`, `areas` and `radiuses`
    /// of length `n`.
    pub fn new(
        name: impl Into<String>,
        centers: Array2<f64>,
        normals: Array2<f64>,
        areas: Array1<f64>,
        radiuses: Array1<f64>,
    ) -> Result<Self, BemError> {
        let n = centers.nrows();
        if centers.ncols() != 3 || normals.dim() != (n, 3) {
            return Err(BemError::InvalidMesh(
                "centers and normals must both be (n, 3) arrays".to_string(),
            ));
        }
        if areas.len() != n || radiuses.len() != n {
            return Err(BemError::InvalidMesh(format!(
                "areas ({}) and radiuses ({}) must match the {} faces",
                areas.len(),
                radiuses.len(),
                n
            )));
        }
        Ok(Self {
            name: name.into(),
            centers,
            normals,
            areas,
            radiuses,
        })
    }

    /// Mesh name, used in log messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of faces.
    pub fn nb_faces(&self) -> usize {
        self.centers.nrows()
    }

    /// Face centers, `(n, 3)`.
    pub fn centers(&self) -> &Array2<f64> {
        &self.centers
    }

    /// Unit face normals, `(n, 3)`.
    pub fn normals(&self) -> &Array2<f64> {
        &self.normals
    }

    /// Face areas.
    pub fn areas(&self) -> &Array1<f64> {
        &self.areas
    }

    /// Face radiuses.
    pub fn radiuses(&self) -> &Array1<f64> {
        &self.radiuses
    }

    /// Largest face radius, or 0.0 for an empty mesh.
    pub fn max_radius(&self) -> f64 {
        self.radiuses.iter().copied().fold(0.0, f64::max)
    }

    /// New mesh restricted to the given faces.
    pub fn extract_faces(&self, faces: &[usize]) -> Mesh {
        let m = faces.len();
        let mut centers = Array2::zeros((m, 3));
        let mut normals = Array2::zeros((m, 3));
        let mut areas = Array1::zeros(m);
        let mut radiuses = Array1::zeros(m);
        for (row, &f) in faces.iter().enumerate() {
            for j in 0..3 {
                centers[[row, j]] = self.centers[[f, j]];
                normals[[row, j]] = self.normals[[f, j]];
            }
            areas[row] = self.areas[f];
            radiuses[row] = self.radiuses[f];
        }
        Mesh {
            name: format!("{}[{} faces]", self.name, m),
            centers,
            normals,
            areas,
            radiuses,
        }
    }

    /// Concatenation of two meshes, `self`'s faces first.
    pub fn join(&self, other: &Mesh, name: impl Into<String>) -> Mesh {
        let n = self.nb_faces() + other.nb_faces();
        let mut centers = Array2::zeros((n, 3));
        let mut normals = Array2::zeros((n, 3));
        let mut areas = Array1::zeros(n);
        let mut radiuses = Array1::zeros(n);
        for (row, mesh, offset) in [(self, 0), (other, self.nb_faces())]
            .into_iter()
            .flat_map(|(m, off)| (0..m.nb_faces()).map(move |i| (i, m, off)))
        {
            for j in 0..3 {
                centers[[offset + row, j]] = mesh.centers[[row, j]];
                normals[[offset + row, j]] = mesh.normals[[row, j]];
            }
            areas[offset + row] = mesh.areas[row];
            radiuses[offset + row] = mesh.radiuses[row];
        }
        Mesh {
            name: name.into(),
            centers,
            normals,
            areas,
            radiuses,
        }
    }

    /// Whether two meshes describe the same discretisation (same panel
    /// count, coincident centers). Used by the engine to decide whether
    /// the half-identity jump term of the boundary integral operators
    /// applies.
    pub fn same_discretisation(&self, other: &Mesh) -> bool {
        if self.nb_faces() != other.nb_faces() {
            return false;
        }
        self.centers
            .iter()
            .zip(other.centers.iter())
            .all(|(a, b)| (a - b).abs() < 1e-12)
    }

    /// Axis-aligned bounding box, `[(xmin, xmax), (ymin, ymax), (zmin, zmax)]`,
    /// from the face centers. `None` for an empty mesh.
    pub fn bounding_box(&self) -> Option<[(f64, f64); 3]> {
        if self.nb_faces() == 0 {
            return None;
        }
        let mut bbox = [(f64::INFINITY, f64::NEG_INFINITY); 3];
        for i in 0..self.nb_faces() {
            for j in 0..3 {
                let x = self.centers[[i, j]];
                bbox[j].0 = bbox[j].0.min(x);
                bbox[j].1 = bbox[j].1.max(x);
            }
        }
        Some(bbox)
    }
}

/// Per-panel quantities from four corner points.
///
/// The normal is the normalized cross product of the diagonals, which is
/// robust for mildly warped quadrilaterals; the area is the sum of the
/// two triangles of the split along the first diagonal.
fn quad_panel(corners: &[[f64; 3]; 4]) -> ([f64; 3], [f64; 3], f64, f64) {
    let center = [
        corners.iter().map(|c| c[0]).sum::<f64>() / 4.0,
        corners.iter().map(|c| c[1]).sum::<f64>() / 4.0,
        corners.iter().map(|c| c[2]).sum::<f64>() / 4.0,
    ];

    let d1 = sub(corners[2], corners[0]);
    let d2 = sub(corners[3], corners[1]);
    let cr = cross(d1, d2);
    let norm = (cr[0] * cr[0] + cr[1] * cr[1] + cr[2] * cr[2]).sqrt();
    let normal = if norm > 0.0 {
        [cr[0] / norm, cr[1] / norm, cr[2] / norm]
    } else {
        [0.0, 0.0, 1.0]
    };

    let t1 = triangle_area(corners[0], corners[1], corners[2]);
    let t2 = triangle_area(corners[0], corners[2], corners[3]);
    let area = t1 + t2;

    let radius = corners
        .iter()
        .map(|c| {
            let d = sub(*c, center);
            (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
        })
        .fold(0.0, f64::max);

    (center, normal, area, radius)
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn triangle_area(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> f64 {
    let cr = cross(sub(b, a), sub(c, a));
    0.5 * (cr[0] * cr[0] + cr[1] * cr[1] + cr[2] * cr[2]).sqrt()
}

fn build_from_quads(name: &str, quads: Vec<[[f64; 3]; 4]>) -> Mesh {
    let n = quads.len();
    let mut centers = Array2::zeros((n, 3));
    let mut normals = Array2::zeros((n, 3));
    let mut areas = Array1::zeros(n);
    let mut radiuses = Array1::zeros(n);
    for (i, q) in quads.iter().enumerate() {
        let (c, nrm, a, r) = quad_panel(q);
        for j in 0..3 {
            centers[[i, j]] = c[j];
            normals[[i, j]] = nrm[j];
        }
        areas[i] = a;
        radiuses[i] = r;
    }
    Mesh {
        name: name.to_string(),
        centers,
        normals,
        areas,
        radiuses,
    }
}

/// UV sphere mesh with quad panels and outward normals.
///
/// `theta` is the polar angle from the +z axis; restricting its range
/// produces spherical caps (e.g. the lower half of a floating hull).
pub fn sphere_mesh_with_theta_range(
    name: &str,
    radius: f64,
    center: [f64; 3],
    n_theta: usize,
    n_phi: usize,
    theta_range: (f64, f64),
) -> Mesh {
    let (t0, t1) = theta_range;
    let mut quads = Vec::with_capacity(n_theta * n_phi);
    for it in 0..n_theta {
        let ta = t0 + (t1 - t0) * it as f64 / n_theta as f64;
        let tb = t0 + (t1 - t0) * (it + 1) as f64 / n_theta as f64;
        for ip in 0..n_phi {
            let pa = 2.0 * std::f64::consts::PI * ip as f64 / n_phi as f64;
            let pb = 2.0 * std::f64::consts::PI * (ip + 1) as f64 / n_phi as f64;
            let p = |t: f64, ph: f64| {
                [
                    center[0] + radius * t.sin() * ph.cos(),
                    center[1] + radius * t.sin() * ph.sin(),
                    center[2] + radius * t.cos(),
                ]
            };
            quads.push([p(ta, pa), p(tb, pa), p(tb, pb), p(ta, pb)]);
        }
    }
    let mut mesh = build_from_quads(name, quads);
    // Orient normals outward (away from the sphere center).
    for i in 0..mesh.nb_faces() {
        let dot = (0..3)
            .map(|j| mesh.normals[[i, j]] * (mesh.centers[[i, j]] - center[j]))
            .sum::<f64>();
        if dot < 0.0 {
            for j in 0..3 {
                mesh.normals[[i, j]] = -mesh.normals[[i, j]];
            }
        }
    }
    mesh
}

/// Full UV sphere mesh.
pub fn sphere_mesh(name: &str, radius: f64, center: [f64; 3], n_theta: usize, n_phi: usize) -> Mesh {
    sphere_mesh_with_theta_range(
        name,
        radius,
        center,
        n_theta,
        n_phi,
        (0.0, std::f64::consts::PI),
    )
}

/// Lower half of a sphere centered on the z = 0 plane, a simple floating
/// hull for tests and demos.
pub fn hemisphere_mesh(name: &str, radius: f64, n_theta: usize, n_phi: usize) -> Mesh {
    sphere_mesh_with_theta_range(
        name,
        radius,
        [0.0, 0.0, 0.0],
        n_theta,
        n_phi,
        (std::f64::consts::FRAC_PI_2, std::f64::consts::PI),
    )
}

/// Horizontal rectangular panel grid at elevation `z`, normals pointing
/// up. Used for free surfaces and lids.
pub fn rectangle_mesh(
    name: &str,
    x_range: (f64, f64),
    nx: usize,
    y_range: (f64, f64),
    ny: usize,
    z: f64,
) -> Mesh {
    let mut quads = Vec::with_capacity(nx * ny);
    for ix in 0..nx {
        let xa = x_range.0 + (x_range.1 - x_range.0) * ix as f64 / nx as f64;
        let xb = x_range.0 + (x_range.1 - x_range.0) * (ix + 1) as f64 / nx as f64;
        for iy in 0..ny {
            let ya = y_range.0 + (y_range.1 - y_range.0) * iy as f64 / ny as f64;
            let yb = y_range.0 + (y_range.1 - y_range.0) * (iy + 1) as f64 / ny as f64;
            quads.push([[xa, ya, z], [xb, ya, z], [xb, yb, z], [xa, yb, z]]);
        }
    }
    let mut mesh = build_from_quads(name, quads);
    for i in 0..mesh.nb_faces() {
        if mesh.normals[[i, 2]] < 0.0 {
            for j in 0..3 {
                mesh.normals[[i, j]] = -mesh.normals[[i, j]];
            }
        }
    }
    mesh
}

/// Disk-shaped panel grid at elevation `z`: the rectangle grid clipped to
/// the given radius. A crude lid for hemispherical hulls.
pub fn disk_mesh(name: &str, radius: f64, n: usize, z: f64) -> Mesh {
    let full = rectangle_mesh(name, (-radius, radius), n, (-radius, radius), n, z);
    let inside: Vec<usize> = (0..full.nb_faces())
        .filter(|&i| {
            let x = full.centers[[i, 0]];
            let y = full.centers[[i, 1]];
            (x * x + y * y).sqrt() < radius
        })
        .collect();
    let mut mesh = full.extract_faces(&inside);
    mesh.name = name.to_string();
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sphere_mesh_area() {
        let mesh = sphere_mesh("sphere", 1.0, [0.0, 0.0, 0.0], 12, 24);
        let total: f64 = mesh.areas().sum();
        // Inscribed panels underestimate the sphere area slightly.
        assert_relative_eq!(total, 4.0 * std::f64::consts::PI, max_relative = 0.05);
    }

    #[test]
    fn test_sphere_normals_outward_and_unit() {
        let mesh = sphere_mesh("sphere", 2.0, [1.0, 0.0, -3.0], 8, 16);
        for i in 0..mesh.nb_faces() {
            let n2: f64 = (0..3).map(|j| mesh.normals()[[i, j]].powi(2)).sum();
            assert_relative_eq!(n2, 1.0, epsilon = 1e-12);
            let dot: f64 = (0..3)
                .map(|j| mesh.normals()[[i, j]] * (mesh.centers()[[i, j]] - [1.0, 0.0, -3.0][j]))
                .sum();
            assert!(dot > 0.0);
        }
    }

    #[test]
    fn test_hemisphere_below_surface() {
        let mesh = hemisphere_mesh("hull", 1.0, 6, 12);
        for i in 0..mesh.nb_faces() {
            assert!(mesh.centers()[[i, 2]] <= 0.0);
        }
    }

    #[test]
    fn test_extract_and_join_roundtrip() {
        let mesh = rectangle_mesh("fs", (0.0, 2.0), 4, (0.0, 1.0), 2, 0.0);
        let head = mesh.extract_faces(&[0, 1, 2]);
        let tail = mesh.extract_faces(&(3..mesh.nb_faces()).collect::<Vec<_>>());
        let rejoined = head.join(&tail, "rejoined");
        assert!(rejoined.same_discretisation(&mesh));
    }

    #[test]
    fn test_rectangle_area_exact() {
        let mesh = rectangle_mesh("fs", (-1.0, 1.0), 5, (0.0, 3.0), 3, 0.0);
        assert_relative_eq!(mesh.areas().sum(), 6.0, epsilon = 1e-12);
    }
}
