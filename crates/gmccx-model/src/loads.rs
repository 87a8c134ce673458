//! Loads and supports, described geometrically until bound to the mesh.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::expression::Expression;
use crate::geometry::{Point, Polyline, Surface, Vector, Volume};

/// Load definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Load {
    /// Force applied at the primary node closest to `point`
    NodalForce { point: Point, force: Vector },
    /// Moment `axis * value` applied at the primary node closest to `point`
    NodalMoment { point: Point, axis: Vector, value: f64 },
    /// Hydrostatic-like pressure on elements bounding infill volumes
    Infill(InfillLoad),
    /// Uniform pressure on elements lying on any of the surfaces
    Pressure { surfaces: Vec<Surface>, value: f64 },
    /// Gravitational acceleration added to the model gravity
    Gravity { acceleration: Vector },
}

impl Load {
    pub fn kind(&self) -> &'static str {
        match self {
            Load::NodalForce { .. } => "NodalForce",
            Load::NodalMoment { .. } => "NodalMoment",
            Load::Infill(_) => "InfillLoad",
            Load::Pressure { .. } => "PressureLoad",
            Load::Gravity { .. } => "GravityLoad",
        }
    }
}

/// Infill pressure: `function` is evaluated per element with `g` bound to
/// the density, `x` to the depth below the infill top and `z` to the infill
/// height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfillLoad {
    pub infills: Vec<Infill>,
    pub density: f64,
    pub function: Expression,
}

/// A closed volume with its cached height range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Volume", into = "Volume")]
pub struct Infill {
    volume: Volume,
    min_z: f64,
    max_z: f64,
}

impl Infill {
    pub fn new(volume: Volume) -> Self {
        let (min_z, max_z) = volume.z_range();
        Self {
            volume,
            min_z,
            max_z,
        }
    }

    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    pub fn min_z(&self) -> f64 {
        self.min_z
    }

    pub fn max_z(&self) -> f64 {
        self.max_z
    }
}

impl From<Volume> for Infill {
    fn from(volume: Volume) -> Self {
        Infill::new(volume)
    }
}

impl From<Infill> for Volume {
    fn from(infill: Infill) -> Self {
        infill.volume
    }
}

/// Blocked degrees of freedom. DOF 1-3 are translations, 4-6 rotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SupportTypeDef", into = "SupportTypeDef")]
pub struct SupportType {
    dofs: BTreeSet<u8>,
    physical: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SupportTypeDef {
    dofs: Vec<u8>,
    #[serde(default)]
    physical: bool,
}

impl TryFrom<SupportTypeDef> for SupportType {
    type Error = ModelError;

    fn try_from(def: SupportTypeDef) -> Result<Self> {
        SupportType::new(def.dofs, def.physical)
    }
}

impl From<SupportType> for SupportTypeDef {
    fn from(t: SupportType) -> Self {
        SupportTypeDef {
            dofs: t.dofs.into_iter().collect(),
            physical: t.physical,
        }
    }
}

impl SupportType {
    /// `physical` fixes whole faces instead of rotations and is only valid
    /// when exactly the translations are blocked.
    pub fn new(dofs: impl IntoIterator<Item = u8>, physical: bool) -> Result<Self> {
        let dofs: BTreeSet<u8> = dofs.into_iter().collect();
        if dofs.is_empty() {
            return Err(ModelError::InvalidSupportType("no DOF blocked".into()));
        }
        if let Some(bad) = dofs.iter().find(|d| !(1..=6).contains(*d)) {
            return Err(ModelError::InvalidSupportType(format!("DOF {bad} out of 1..6")));
        }
        if physical && dofs != BTreeSet::from([1, 2, 3]) {
            return Err(ModelError::InvalidSupportType(
                "physical fixing requires exactly DOFs 1, 2 and 3".into(),
            ));
        }
        Ok(Self { dofs, physical })
    }

    pub fn fixed() -> Self {
        Self {
            dofs: (1..=6).collect(),
            physical: false,
        }
    }

    pub fn pinned() -> Self {
        Self {
            dofs: BTreeSet::from([1, 2, 3]),
            physical: false,
        }
    }

    pub fn dofs(&self) -> impl Iterator<Item = u8> + '_ {
        self.dofs.iter().copied()
    }

    pub fn physical(&self) -> bool {
        self.physical
    }
}

/// Geometry a support is attached to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "geometry")]
pub enum SupportGeometry {
    Point(Point),
    Curve(Polyline),
    Surface(Surface),
}

/// Named support with its bound nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Support {
    pub name: String,
    pub geometry: Vec<SupportGeometry>,
    pub support_type: SupportType,
    #[serde(skip)]
    pub(crate) nodes: BTreeSet<usize>,
}

impl Support {
    pub fn new(name: &str, geometry: Vec<SupportGeometry>, support_type: SupportType) -> Self {
        Self {
            name: name.to_string(),
            geometry,
            support_type,
            nodes: BTreeSet::new(),
        }
    }

    /// Bound node ids in ascending order
    pub fn nodes(&self) -> &BTreeSet<usize> {
        &self.nodes
    }
}
