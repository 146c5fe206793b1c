//! DS9 region model for source and background apertures.
//!
//! Regions are anchored at a physical pixel position and serialized as
//! minimal DS9 region files:
//!
//! ```text
//! # Region file format: DS9 version 4.1
//! global color=green ...
//! physical
//! circle(512,498,20)
//! ```

use crate::{Error, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Comment line identifying the region file format.
pub const REGION_FORMAT_HEADER: &str = "# Region file format: DS9 version 4.1";

/// DS9 global property line written after the format header.
const GLOBAL_PROPERTIES: &str = "global color=green dashlist=8 3 width=1 \
    font=\"helvetica 10 normal\" select=1 highlite=1 dash=0 fixed=0 edit=1 \
    move=1 delete=1 include=1 source=1";

/// Coordinate system used when none is given.
pub const DEFAULT_COORD_SYSTEM: &str = "physical";

/// A 1-based detector pixel position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelPosition {
    /// X pixel coordinate.
    pub x: f64,
    /// Y pixel coordinate.
    pub y: f64,
}

impl PixelPosition {
    /// Creates a new pixel position.
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for PixelPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Aperture geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "shape", rename_all = "lowercase"))]
pub enum Shape {
    /// Circular aperture.
    Circle { radius: f64 },
    /// Annular aperture between two radii.
    Annulus { inner: f64, outer: f64 },
}

impl Shape {
    /// DS9 name of the shape.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Shape::Circle { .. } => "circle",
            Shape::Annulus { .. } => "annulus",
        }
    }

    /// Dimensions in DS9 parameter order.
    #[must_use]
    pub fn dimensions(&self) -> Vec<f64> {
        match *self {
            Shape::Circle { radius } => vec![radius],
            Shape::Annulus { inner, outer } => vec![inner, outer],
        }
    }

    fn validate(self) -> Result<Self> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        let reason = match self {
            Shape::Circle { radius } if !positive(radius) => Some("radius must be positive"),
            Shape::Annulus { inner, outer } if !positive(inner) || !positive(outer) => {
                Some("radii must be positive")
            }
            Shape::Annulus { inner, outer } if inner >= outer => {
                Some("inner radius must be smaller than outer radius")
            }
            _ => None,
        };

        match reason {
            Some(reason) => Err(Error::InvalidDimensions {
                shape: self.name(),
                dimensions: self.dimensions(),
                reason,
            }),
            None => Ok(self),
        }
    }
}

/// A shape anchored at a pixel position in a named coordinate system.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Region {
    shape: Shape,
    center: PixelPosition,
    coord_system: String,
}

impl Region {
    /// Builds a region from a DS9 shape name and its dimension list.
    ///
    /// # Errors
    /// Returns [`Error::InvalidShape`] for unknown shape names and
    /// [`Error::InvalidDimensions`] when the dimensions do not fit the shape.
    pub fn new(
        shape: &str,
        dimensions: &[f64],
        center: PixelPosition,
        coord_system: impl Into<String>,
    ) -> Result<Self> {
        let shape = match (shape, dimensions) {
            ("circle", &[radius]) => Shape::Circle { radius },
            ("annulus", &[inner, outer]) => Shape::Annulus { inner, outer },
            ("circle", _) => {
                return Err(Error::InvalidDimensions {
                    shape: "circle",
                    dimensions: dimensions.to_vec(),
                    reason: "expected exactly one radius",
                })
            }
            ("annulus", _) => {
                return Err(Error::InvalidDimensions {
                    shape: "annulus",
                    dimensions: dimensions.to_vec(),
                    reason: "expected inner and outer radius",
                })
            }
            (other, _) => return Err(Error::InvalidShape(other.to_string())),
        };
        Self::from_shape(shape, center, coord_system)
    }

    /// Builds a region from an already typed shape.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDimensions`] when the shape's invariants fail
    /// and [`Error::InvalidCoordSystem`] for a label a region file cannot
    /// carry.
    pub fn from_shape(
        shape: Shape,
        center: PixelPosition,
        coord_system: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            shape: shape.validate()?,
            center,
            coord_system: validate_coord_system(coord_system.into())?,
        })
    }

    /// Circle of `radius` pixels in physical coordinates.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDimensions`] if the radius is not positive.
    pub fn circle(center: PixelPosition, radius: f64) -> Result<Self> {
        Self::from_shape(Shape::Circle { radius }, center, DEFAULT_COORD_SYSTEM)
    }

    /// Annulus between `inner` and `outer` pixels in physical coordinates.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDimensions`] unless `0 < inner < outer`.
    pub fn annulus(center: PixelPosition, inner: f64, outer: f64) -> Result<Self> {
        Self::from_shape(
            Shape::Annulus { inner, outer },
            center,
            DEFAULT_COORD_SYSTEM,
        )
    }

    /// Replaces the coordinate system label.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCoordSystem`] unless the label is a single
    /// word such as `physical`, `image` or `fk5`.
    pub fn with_coord_system(mut self, coord_system: impl Into<String>) -> Result<Self> {
        self.coord_system = validate_coord_system(coord_system.into())?;
        Ok(self)
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    #[must_use]
    pub fn center(&self) -> PixelPosition {
        self.center
    }

    #[must_use]
    pub fn coord_system(&self) -> &str {
        &self.coord_system
    }

    /// DS9 shape expression, e.g. `circle(512,498,20)`.
    #[must_use]
    pub fn expression(&self) -> String {
        let PixelPosition { x, y } = self.center;
        match self.shape {
            Shape::Circle { radius } => format!("circle({x},{y},{radius})"),
            Shape::Annulus { inner, outer } => format!("annulus({x},{y},{inner},{outer})"),
        }
    }

    /// Full region file text.
    #[must_use]
    pub fn to_file_contents(&self) -> String {
        format!(
            "{REGION_FORMAT_HEADER}\n{GLOBAL_PROPERTIES}\n{}\n{}\n",
            self.coord_system,
            self.expression()
        )
    }

    /// Writes the region file to `path`, replacing any existing file.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be created or written.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(self.to_file_contents().as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Reads a region file written by [`Region::write`] or DS9.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be read, or a parse error if
    /// its contents are not a single circle or annulus region.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        std::fs::read_to_string(path)?.parse()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression())
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(contents: &str) -> Result<Self> {
        let lines: Vec<&str> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| !line.starts_with('#') && !line.starts_with("global"))
            .collect();

        let [coord_system, expression, ..] = lines.as_slice() else {
            return Err(Error::Parse(format!(
                "expected a coordinate system line and a shape line, found {} line(s)",
                lines.len()
            )));
        };

        let (shape, params) = parse_expression(expression)?;
        let center = PixelPosition::new(params[0], params[1]);
        Region::new(shape, &params[2..], center, *coord_system)
    }
}

/// Labels are written on their own line, so they must survive the reader's
/// trimming and comment/global filtering unchanged.
fn validate_coord_system(label: String) -> Result<String> {
    let word = !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if word && !label.starts_with("global") {
        Ok(label)
    } else {
        Err(Error::InvalidCoordSystem(label))
    }
}

/// Splits `shape(a,b,...)` into its name and numeric parameters.
fn parse_expression(expression: &str) -> Result<(&str, Vec<f64>)> {
    // DS9 allows trailing properties: `circle(1,2,3) # color=red`
    let expression = expression.split('#').next().unwrap_or_default().trim();

    let (shape, rest) = expression
        .split_once('(')
        .ok_or_else(|| Error::Parse(format!("missing '(' in shape '{expression}'")))?;
    let shape = shape.trim();
    if shape != "circle" && shape != "annulus" {
        return Err(Error::Parse(format!("unrecognized shape '{shape}'")));
    }

    let params = rest
        .trim_end()
        .strip_suffix(')')
        .ok_or_else(|| Error::Parse(format!("missing ')' in shape '{expression}'")))?
        .split(',')
        .map(|token| {
            token
                .trim()
                .parse::<f64>()
                .map_err(|_| Error::Parse(format!("bad parameter '{token}' in '{expression}'")))
        })
        .collect::<Result<Vec<f64>>>()?;

    let expected = if shape == "circle" { 3 } else { 4 };
    if params.len() != expected {
        return Err(Error::Parse(format!(
            "{shape} takes {expected} parameters, got {}",
            params.len()
        )));
    }

    Ok((shape, params))
}

/// BACKSCAL values for a source/background region pair.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BackgroundScale {
    /// BACKSCAL for the source spectrum.
    pub source: f64,
    /// BACKSCAL for the background spectrum.
    pub background: f64,
}

impl BackgroundScale {
    /// WT-mode convention: a circle of radius `r` covers `2r` pixels of the
    /// one-dimensional readout, an annulus covers `outer - inner - 1`.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedRegionShape`] unless the source is a circle
    /// and the background an annulus.
    pub fn for_wt_regions(source: &Region, background: &Region) -> Result<Self> {
        match (source.shape(), background.shape()) {
            (Shape::Circle { radius }, Shape::Annulus { inner, outer }) => Ok(Self {
                source: 2.0 * radius,
                background: outer - inner - 1.0,
            }),
            (s, b) => Err(Error::UnsupportedRegionShape {
                source_shape: s.name(),
                background_shape: b.name(),
            }),
        }
    }
}
