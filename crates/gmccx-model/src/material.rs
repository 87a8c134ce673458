//! Material definitions, the per-model material collection and a small
//! library of standard materials.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Elastic constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Elasticity {
    /// Young's modulus and Poisson's ratio
    Isotropic {
        youngs_modulus: f64,
        poissons_ratio: f64,
    },
    /// Orthotropic engineering constants
    EngineeringConstants {
        /// E1, E2, E3
        youngs_moduli: [f64; 3],
        /// v12, v13, v23
        poissons_ratios: [f64; 3],
        /// G12, G13, G23
        shear_moduli: [f64; 3],
    },
}

/// Named material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    #[serde(default)]
    pub density: f64,
    #[serde(flatten)]
    pub elasticity: Elasticity,
}

impl Material {
    pub fn isotropic(name: &str, youngs_modulus: f64, poissons_ratio: f64, density: f64) -> Self {
        Self {
            name: name.to_string(),
            density,
            elasticity: Elasticity::Isotropic {
                youngs_modulus,
                poissons_ratio,
            },
        }
    }

    pub fn engineering_constants(
        name: &str,
        youngs_moduli: [f64; 3],
        poissons_ratios: [f64; 3],
        shear_moduli: [f64; 3],
        density: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            density,
            elasticity: Elasticity::EngineeringConstants {
                youngs_moduli,
                poissons_ratios,
                shear_moduli,
            },
        }
    }
}

/// Materials of a model, unique by name.
#[derive(Debug, Clone, Default)]
pub struct MaterialCollection {
    items: Vec<Arc<Material>>,
}

impl MaterialCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a material, returning the instance stored in the collection.
    ///
    /// Re-adding the same instance (or an identical definition) is a no-op;
    /// a different material under an existing name is rejected.
    pub fn add(&mut self, material: Arc<Material>) -> Result<Arc<Material>> {
        if let Some(existing) = self.get(&material.name) {
            if Arc::ptr_eq(existing, &material) || **existing == *material {
                return Ok(Arc::clone(existing));
            }
            return Err(ModelError::MaterialConflict(material.name.clone()));
        }
        self.items.push(Arc::clone(&material));
        Ok(material)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Material>> {
        self.items.iter().find(|m| m.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Material>> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Library of standard isotropic materials (SI units).
pub struct MaterialLibrary;

impl MaterialLibrary {
    pub fn standard() -> Vec<Material> {
        vec![
            Material::isotropic("Steel", 210e9, 0.3, 7860.0),
            Material::isotropic("Concrete", 17e9, 0.2, 2400.0),
            Material::isotropic("Aluminium", 69e9, 0.33, 2700.0),
        ]
    }

    /// Case-insensitive lookup
    pub fn find(name: &str) -> Option<Material> {
        Self::standard()
            .into_iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }
}
