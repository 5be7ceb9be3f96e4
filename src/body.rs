//! Floating bodies and free surfaces
//!
//! A [`FloatingBody`] owns a hull mesh, an optional lid mesh (panels
//! closing the waterplane opening, used to condition the linear system
//! against irregular frequencies), and named rigid-body degrees of
//! freedom described by a displacement vector on every hull face.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use num_complex::Complex64;

use crate::error::BemError;
use crate::mesh::Mesh;

/// A floating or submerged body.
#[derive(Debug, Clone)]
pub struct FloatingBody {
    name: String,
    mesh: Mesh,
    lid_mesh: Option<Mesh>,
    dofs: Vec<(String, Array2<f64>)>,
}

impl FloatingBody {
    /// Create a body from a hull mesh, with no lid and no dofs.
    pub fn new(name: impl Into<String>, mesh: Mesh) -> Self {
        Self {
            name: name.into(),
            mesh,
            lid_mesh: None,
            dofs: Vec::new(),
        }
    }

    /// Attach a lid mesh.
    pub fn with_lid(mut self, lid_mesh: Mesh) -> Self {
        self.lid_mesh = Some(lid_mesh);
        self
    }

    /// Declare a degree of freedom from its per-face displacement
    /// vectors, `(nb_hull_faces, 3)`.
    pub fn add_dof(&mut self, name: impl Into<String>, displacement: Array2<f64>) -> Result<(), BemError> {
        if displacement.dim() != (self.mesh.nb_faces(), 3) {
            return Err(BemError::InvalidMesh(format!(
                "dof displacement must be ({}, 3)",
                self.mesh.nb_faces()
            )));
        }
        self.dofs.push((name.into(), displacement));
        Ok(())
    }

    /// Declare a rigid translation dof along the given unit direction.
    pub fn add_translation_dof(&mut self, name: impl Into<String>, direction: [f64; 3]) {
        let n = self.mesh.nb_faces();
        let mut displacement = Array2::zeros((n, 3));
        for i in 0..n {
            for j in 0..3 {
                displacement[[i, j]] = direction[j];
            }
        }
        self.dofs.push((name.into(), displacement));
    }

    /// Declare the three rigid translation dofs Surge, Sway, Heave.
    pub fn add_all_translation_dofs(&mut self) {
        self.add_translation_dof("Surge", [1.0, 0.0, 0.0]);
        self.add_translation_dof("Sway", [0.0, 1.0, 0.0]);
        self.add_translation_dof("Heave", [0.0, 0.0, 1.0]);
    }

    /// Body name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hull mesh.
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Lid mesh, if any.
    pub fn lid_mesh(&self) -> Option<&Mesh> {
        self.lid_mesh.as_ref()
    }

    /// Declared dofs, in declaration order.
    pub fn dofs(&self) -> &[(String, Array2<f64>)] {
        &self.dofs
    }

    /// Names of the declared dofs.
    pub fn dof_names(&self) -> Vec<String> {
        self.dofs.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Displacement field of a dof, by name.
    pub fn dof(&self, name: &str) -> Option<&Array2<f64>> {
        self.dofs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    /// The hull mesh with the lid appended, or the hull alone.
    ///
    /// The lid faces come last, so quantities over the joined mesh can be
    /// restricted to the hull by truncation.
    pub fn mesh_including_lid(&self) -> Mesh {
        match &self.lid_mesh {
            Some(lid) => self
                .mesh
                .join(lid, format!("{}+lid", self.name)),
            None => self.mesh.clone(),
        }
    }

    /// Shortest wavelength the hull discretisation can resolve: the
    /// largest panel radius must stay below wavelength/8.
    pub fn minimal_computable_wavelength(&self) -> f64 {
        8.0 * self.mesh.max_radius()
    }

    /// Estimate of the first irregular frequency of the discretised
    /// integral equation, from the lowest sloshing mode of the
    /// rectangular tank bounding the hull: `k = π √(1/Lx² + 1/Ly²)` and
    /// `ω = √(g k / tanh(k T))` with `T` the draught. Returns +∞ when
    /// the bounding box degenerates (no internal waterplane).
    pub fn first_irregular_frequency_estimate(&self, g: f64) -> f64 {
        let Some(bbox) = self.mesh.bounding_box() else {
            return f64::INFINITY;
        };
        let lx = bbox[0].1 - bbox[0].0;
        let ly = bbox[1].1 - bbox[1].0;
        let draught = -bbox[2].0;
        if lx <= 0.0 || ly <= 0.0 || draught <= 0.0 {
            return f64::INFINITY;
        }
        let k = std::f64::consts::PI * (1.0 / (lx * lx) + 1.0 / (ly * ly)).sqrt();
        (g * k / (k * draught).tanh()).sqrt()
    }

    /// Integrate a hull pressure distribution into generalized forces,
    /// one per declared dof: `F = -Σ_j p_j (n_j · V_j) A_j`.
    pub fn integrate_pressure(
        &self,
        pressure: &Array1<Complex64>,
    ) -> BTreeMap<String, Complex64> {
        let n = self.mesh.nb_faces();
        debug_assert_eq!(pressure.len(), n);
        let normals = self.mesh.normals();
        let areas = self.mesh.areas();
        self.dofs
            .iter()
            .map(|(name, displacement)| {
                let mut force = Complex64::new(0.0, 0.0);
                for j in 0..n {
                    let n_dot_v: f64 = (0..3)
                        .map(|a| normals[[j, a]] * displacement[[j, a]])
                        .sum();
                    force -= pressure[j] * n_dot_v * areas[j];
                }
                (name.clone(), force)
            })
            .collect()
    }
}

/// A meshed free surface, identified by a stable string id.
///
/// The id is the key of the legacy elevation cache on results
/// (last-write-wins), instead of object identity.
#[derive(Debug, Clone)]
pub struct FreeSurface {
    id: String,
    mesh: Mesh,
}

impl FreeSurface {
    /// Create a free surface from its mesh.
    pub fn new(id: impl Into<String>, mesh: Mesh) -> Self {
        Self { id: id.into(), mesh }
    }

    /// Stable identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Free-surface mesh.
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{disk_mesh, hemisphere_mesh, sphere_mesh};
    use approx::assert_relative_eq;

    fn submerged_sphere() -> FloatingBody {
        let mesh = sphere_mesh("sphere", 1.0, [0.0, 0.0, -3.0], 8, 16);
        let mut body = FloatingBody::new("sphere", mesh);
        body.add_all_translation_dofs();
        body
    }

    #[test]
    fn test_uniform_pressure_gives_no_net_translation_force() {
        // A closed surface under uniform pressure carries no net force.
        let body = submerged_sphere();
        let p = Array1::from_elem(body.mesh().nb_faces(), Complex64::new(1.0, 0.0));
        let forces = body.integrate_pressure(&p);
        for (_, f) in forces {
            assert_relative_eq!(f.norm(), 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_mesh_including_lid_appends_lid_last() {
        let hull = hemisphere_mesh("hull", 1.0, 4, 8);
        let lid = disk_mesh("lid", 0.9, 4, -0.01);
        let nb_hull = hull.nb_faces();
        let nb_lid = lid.nb_faces();
        let body = FloatingBody::new("buoy", hull).with_lid(lid);
        let joined = body.mesh_including_lid();
        assert_eq!(joined.nb_faces(), nb_hull + nb_lid);
        // Hull faces keep their positions.
        assert!(joined
            .extract_faces(&(0..nb_hull).collect::<Vec<_>>())
            .same_discretisation(body.mesh()));
    }

    #[test]
    fn test_irregular_frequency_estimate_finite_for_floating_hull() {
        let hull = hemisphere_mesh("hull", 1.0, 6, 12);
        let body = FloatingBody::new("buoy", hull);
        let omega_irr = body.first_irregular_frequency_estimate(9.81);
        assert!(omega_irr.is_finite());
        assert!(omega_irr > 0.0);
    }

    #[test]
    fn test_minimal_computable_wavelength() {
        let body = submerged_sphere();
        assert_relative_eq!(
            body.minimal_computable_wavelength(),
            8.0 * body.mesh().max_radius(),
        );
    }
}
