//! Building components: bars (beam members) and panels (shells/membranes).

use std::sync::Arc;

use nalgebra::{Rotation3, Unit};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::geometry::{LineSegment, PARALLEL_ANGLE_TOLERANCE, Plane, Surface, Vector, is_parallel};
use crate::material::Material;
use crate::mesh::ElementFamily;
use crate::profile::Profile;
use crate::store::Indexed;

/// Kind of a building component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Bar,
    Panel,
}

impl ComponentKind {
    /// Dimension of the elements meshed for this kind
    pub fn dimension(&self) -> usize {
        match self {
            ComponentKind::Bar => 1,
            ComponentKind::Panel => 2,
        }
    }
}

/// Linear member meshed with beam elements
#[derive(Debug, Clone)]
pub struct Bar {
    id: Option<usize>,
    line: LineSegment,
    profile: Profile,
    pub(crate) material: Arc<Material>,
    /// Radians about the local longitudinal axis
    rotation: f64,
    /// Section offset along local x and y
    offset: [f64; 2],
    lcs: Plane,
    pub(crate) elements: Vec<usize>,
}

impl Bar {
    pub fn new(
        line: LineSegment,
        profile: Profile,
        material: Arc<Material>,
        rotation: f64,
        offset: [f64; 2],
    ) -> Result<Self> {
        let lcs = Self::local_frame(&line)?;
        Ok(Self {
            id: None,
            line,
            profile,
            material,
            rotation,
            offset,
            lcs,
            elements: Vec::new(),
        })
    }

    /// Frame at the midpoint with z along the bar. Local x is the tangent
    /// turned 90 degrees towards global Z; vertical bars use global X.
    fn local_frame(line: &LineSegment) -> Result<Plane> {
        let direction = line
            .unit_tangent()
            .ok_or_else(|| ModelError::InvalidGeometry("bar has zero length".into()))?;

        let local_x = if is_parallel(&direction, &Vector::z(), PARALLEL_ANGLE_TOLERANCE) {
            Vector::x()
        } else {
            let axis = Unit::new_normalize(direction.cross(&Vector::z()));
            Rotation3::from_axis_angle(&axis, std::f64::consts::FRAC_PI_2) * direction
        };
        let local_y =
            Rotation3::from_axis_angle(&Unit::new_unchecked(direction), std::f64::consts::FRAC_PI_2)
                * local_x;

        Plane::new(line.midpoint(), local_x, local_y)
    }

    pub fn line(&self) -> &LineSegment {
        &self.line
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn offset(&self) -> [f64; 2] {
        self.offset
    }

    /// Local frame before the section rotation is applied.
    pub fn lcs(&self) -> &Plane {
        &self.lcs
    }

    /// Local frame turned by the section rotation; this is the frame written
    /// to the solver and used for section forces.
    pub fn rotated_lcs(&self) -> Plane {
        self.lcs.rotated_about_normal(self.rotation)
    }

    pub fn elements(&self) -> &[usize] {
        &self.elements
    }
}

impl Indexed for Bar {
    fn id(&self) -> Option<usize> {
        self.id
    }

    fn set_id(&mut self, id: Option<usize>) {
        self.id = id;
    }
}

/// Planar surface member meshed with 2D elements
#[derive(Debug, Clone)]
pub struct Panel {
    id: Option<usize>,
    surface: Surface,
    thickness: f64,
    pub(crate) material: Arc<Material>,
    family: ElementFamily,
    lcs: Plane,
    pub(crate) elements: Vec<usize>,
}

impl Panel {
    pub fn new(
        surface: Surface,
        thickness: f64,
        material: Arc<Material>,
        family: ElementFamily,
    ) -> Result<Self> {
        if !(thickness.is_finite() && thickness > 0.0) {
            return Err(ModelError::InvalidGeometry(format!(
                "panel thickness must be positive, got {thickness}"
            )));
        }
        let lcs = Plane::fit(surface.vertices())?;
        Ok(Self {
            id: None,
            surface,
            thickness,
            material,
            family,
            lcs,
            elements: Vec::new(),
        })
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    pub fn family(&self) -> ElementFamily {
        self.family
    }

    /// Best-fit plane of the outline, origin at the vertex centroid.
    pub fn lcs(&self) -> &Plane {
        &self.lcs
    }

    pub fn elements(&self) -> &[usize] {
        &self.elements
    }
}

impl Indexed for Panel {
    fn id(&self) -> Option<usize> {
        self.id
    }

    fn set_id(&mut self, id: Option<usize>) {
        self.id = id;
    }
}
