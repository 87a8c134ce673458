//! Bar cross-section profiles.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Cross-section geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ProfileShape {
    Rectangular { height: f64, width: f64 },
    Round { diameter: f64 },
    Pipe { diameter: f64, thickness: f64 },
    Box { height: f64, width: f64, thickness: f64 },
}

/// Named cross-section of a bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProfileDef", into = "ProfileDef")]
pub struct Profile {
    name: String,
    shape: ProfileShape,
}

/// Serialized form, validated through [`Profile::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProfileDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(flatten)]
    shape: ProfileShape,
}

impl TryFrom<ProfileDef> for Profile {
    type Error = ModelError;

    fn try_from(def: ProfileDef) -> Result<Self> {
        Profile::new(def.name, def.shape)
    }
}

impl From<Profile> for ProfileDef {
    fn from(p: Profile) -> Self {
        ProfileDef {
            name: Some(p.name),
            shape: p.shape,
        }
    }
}

impl Profile {
    /// Validate the dimensions; without a name one is derived from the shape.
    pub fn new(name: Option<String>, shape: ProfileShape) -> Result<Self> {
        let positive = |what: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(ModelError::InvalidProfile(format!("{what} must be positive, got {v}")))
            }
        };

        match shape {
            ProfileShape::Rectangular { height, width } => {
                positive("height", height)?;
                positive("width", width)?;
            }
            ProfileShape::Round { diameter } => positive("diameter", diameter)?,
            ProfileShape::Pipe {
                diameter,
                thickness,
            } => {
                positive("diameter", diameter)?;
                positive("thickness", thickness)?;
                if 2.0 * thickness >= diameter {
                    return Err(ModelError::InvalidProfile(format!(
                        "pipe wall {thickness} too thick for diameter {diameter}"
                    )));
                }
            }
            ProfileShape::Box {
                height,
                width,
                thickness,
            } => {
                positive("height", height)?;
                positive("width", width)?;
                positive("thickness", thickness)?;
                if 2.0 * thickness >= height.min(width) {
                    return Err(ModelError::InvalidProfile(format!(
                        "box wall {thickness} too thick for {height}x{width}"
                    )));
                }
            }
        }

        let name = name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| default_name(&shape));
        Ok(Self { name, shape })
    }

    pub fn rectangular(height: f64, width: f64) -> Result<Self> {
        Self::new(None, ProfileShape::Rectangular { height, width })
    }

    pub fn round(diameter: f64) -> Result<Self> {
        Self::new(None, ProfileShape::Round { diameter })
    }

    pub fn pipe(diameter: f64, thickness: f64) -> Result<Self> {
        Self::new(
            None,
            ProfileShape::Pipe {
                diameter,
                thickness,
            },
        )
    }

    pub fn box_section(height: f64, width: f64, thickness: f64) -> Result<Self> {
        Self::new(
            None,
            ProfileShape::Box {
                height,
                width,
                thickness,
            },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &ProfileShape {
        &self.shape
    }

    pub fn height(&self) -> f64 {
        match self.shape {
            ProfileShape::Rectangular { height, .. } | ProfileShape::Box { height, .. } => height,
            ProfileShape::Round { diameter } | ProfileShape::Pipe { diameter, .. } => diameter,
        }
    }

    pub fn width(&self) -> f64 {
        match self.shape {
            ProfileShape::Rectangular { width, .. } | ProfileShape::Box { width, .. } => width,
            ProfileShape::Round { diameter } | ProfileShape::Pipe { diameter, .. } => diameter,
        }
    }

    /// Pipe and box sections are beam general sections, which CalculiX only
    /// supports on quadratic beams.
    pub fn requires_second_order(&self) -> bool {
        matches!(
            self.shape,
            ProfileShape::Pipe { .. } | ProfileShape::Box { .. }
        )
    }

    pub fn section_keyword(&self) -> &'static str {
        if self.requires_second_order() {
            "*BEAM GENERAL SECTION"
        } else {
            "*BEAM SECTION"
        }
    }

    pub fn section_type(&self) -> &'static str {
        match self.shape {
            ProfileShape::Rectangular { .. } => "RECT",
            ProfileShape::Round { .. } => "CIRC",
            ProfileShape::Pipe { .. } => "PIPE",
            ProfileShape::Box { .. } => "BOX",
        }
    }

    /// Section data line values in CalculiX order.
    pub fn section_parameters(&self) -> Vec<f64> {
        match self.shape {
            ProfileShape::Rectangular { height, width } => vec![height, width],
            ProfileShape::Round { diameter } => vec![diameter * 0.5, diameter * 0.5],
            ProfileShape::Pipe {
                diameter,
                thickness,
            } => vec![diameter * 0.5, thickness],
            ProfileShape::Box {
                height,
                width,
                thickness,
            } => vec![height, width, thickness, thickness, thickness, thickness],
        }
    }
}

fn default_name(shape: &ProfileShape) -> String {
    match *shape {
        ProfileShape::Rectangular { height, width } => format!("RECTANGLE_{height}x{width}"),
        ProfileShape::Round { diameter } => format!("CIRCLE_{diameter}"),
        ProfileShape::Pipe {
            diameter,
            thickness,
        } => format!("PIPE_{diameter}x{thickness}"),
        ProfileShape::Box {
            height,
            width,
            thickness,
        } => format!("BOX_{height}x{width}x{thickness}"),
    }
}
