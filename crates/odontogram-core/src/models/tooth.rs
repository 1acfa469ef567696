//! Tooth-level clinical models.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Number of teeth in a full adult chart.
pub const TOOTH_COUNT: usize = 32;

/// Deepest periodontal pocket accepted, in millimeters.
pub const MAX_POCKET_DEPTH_MM: u8 = 15;

/// Highest clinical mobility grade.
pub const MAX_MOBILITY_GRADE: u8 = 3;

/// A tooth number in the Universal 1-32 scheme.
///
/// This is the canonical numbering for every chart. Use [`ToothNumber::to_fdi`]
/// and [`ToothNumber::from_fdi`] when exchanging data with systems that speak
/// FDI two-digit notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ToothNumber(u8);

impl ToothNumber {
    /// Create a tooth number, rejecting anything outside 1..=32.
    pub fn new(number: u8) -> Result<Self, ValidationError> {
        if (1..=TOOTH_COUNT as u8).contains(&number) {
            Ok(Self(number))
        } else {
            Err(ValidationError(format!(
                "Tooth number {} is outside 1-{}",
                number, TOOTH_COUNT
            )))
        }
    }

    /// Like [`ToothNumber::new`] but for wider integer input (FFI, JSON).
    pub fn from_u32(number: u32) -> Result<Self, ValidationError> {
        u8::try_from(number)
            .map_err(|_| ValidationError(format!("Tooth number {} is outside 1-32", number)))
            .and_then(Self::new)
    }

    /// All 32 tooth numbers in ascending order.
    pub fn all() -> impl Iterator<Item = ToothNumber> {
        (1..=TOOTH_COUNT as u8).map(ToothNumber)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based position inside a [`super::Dentition`].
    pub(crate) fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    /// Inverse of [`ToothNumber::index`]. Callers guarantee `index < 32`.
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u8 + 1)
    }

    /// Quadrant of this tooth. Derived from the number, never stored.
    pub fn quadrant(self) -> Quadrant {
        match self.0 {
            1..=8 => Quadrant::UpperRight,
            9..=16 => Quadrant::UpperLeft,
            17..=24 => Quadrant::LowerLeft,
            _ => Quadrant::LowerRight,
        }
    }

    /// Convert to FDI two-digit notation.
    ///
    /// Universal numbering runs around the arch (1 = upper right third molar,
    /// 16 = upper left third molar, 17 = lower left third molar, 32 = lower
    /// right third molar) while FDI restarts at the midline in every quadrant.
    pub fn to_fdi(self) -> u8 {
        let n = self.0;
        match self.quadrant() {
            Quadrant::UpperRight => 18 - (n - 1),
            Quadrant::UpperLeft => 21 + (n - 9),
            Quadrant::LowerLeft => 38 - (n - 17),
            Quadrant::LowerRight => 41 + (n - 25),
        }
    }

    /// Parse an FDI two-digit tooth code (11-18, 21-28, 31-38, 41-48).
    pub fn from_fdi(code: u8) -> Result<Self, ValidationError> {
        let quadrant = code / 10;
        let position = code % 10;
        if !(1..=8).contains(&position) {
            return Err(ValidationError(format!("Invalid FDI tooth code: {}", code)));
        }
        let universal = match quadrant {
            1 => 9 - position,
            2 => 8 + position,
            3 => 25 - position,
            4 => 24 + position,
            _ => return Err(ValidationError(format!("Invalid FDI tooth code: {}", code))),
        };
        Self::new(universal)
    }
}

impl TryFrom<u8> for ToothNumber {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ToothNumber> for u8 {
    fn from(number: ToothNumber) -> Self {
        number.0
    }
}

impl fmt::Display for ToothNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anatomical quadrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Quadrant {
    UpperRight,
    UpperLeft,
    LowerLeft,
    LowerRight,
}

impl Quadrant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quadrant::UpperRight => "upper-right",
            Quadrant::UpperLeft => "upper-left",
            Quadrant::LowerLeft => "lower-left",
            Quadrant::LowerRight => "lower-right",
        }
    }
}

/// One of the five examined faces of a tooth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Mesial,
    Distal,
    Occlusal,
    Buccal,
    Lingual,
}

impl Surface {
    pub const ALL: [Surface; 5] = [
        Surface::Mesial,
        Surface::Distal,
        Surface::Occlusal,
        Surface::Buccal,
        Surface::Lingual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Mesial => "mesial",
            Surface::Distal => "distal",
            Surface::Occlusal => "occlusal",
            Surface::Buccal => "buccal",
            Surface::Lingual => "lingual",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        Surface::ALL
            .into_iter()
            .find(|surface| surface.as_str() == s)
            .ok_or_else(|| ValidationError(format!("Unknown tooth surface: {}", s)))
    }
}

/// Clinical condition recorded for a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceCondition {
    #[default]
    Healthy,
    Caries,
    Filling,
    Crown,
    Missing,
    Implant,
    Bridge,
}

impl SurfaceCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceCondition::Healthy => "healthy",
            SurfaceCondition::Caries => "caries",
            SurfaceCondition::Filling => "filling",
            SurfaceCondition::Crown => "crown",
            SurfaceCondition::Missing => "missing",
            SurfaceCondition::Implant => "implant",
            SurfaceCondition::Bridge => "bridge",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "healthy" => Ok(SurfaceCondition::Healthy),
            "caries" => Ok(SurfaceCondition::Caries),
            "filling" => Ok(SurfaceCondition::Filling),
            "crown" => Ok(SurfaceCondition::Crown),
            "missing" => Ok(SurfaceCondition::Missing),
            "implant" => Ok(SurfaceCondition::Implant),
            "bridge" => Ok(SurfaceCondition::Bridge),
            _ => Err(ValidationError(format!("Unknown surface condition: {}", s))),
        }
    }
}

/// State of a single surface.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SurfaceState {
    pub condition: SurfaceCondition,
    /// Restorative material (e.g. "composite", "amalgam")
    pub material: Option<String>,
    pub notes: Option<String>,
}

impl SurfaceState {
    pub fn with_condition(condition: SurfaceCondition) -> Self {
        Self {
            condition,
            material: None,
            notes: None,
        }
    }
}

/// All five surfaces of a tooth. A field per surface, so none can be absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Surfaces {
    pub mesial: SurfaceState,
    pub distal: SurfaceState,
    pub occlusal: SurfaceState,
    pub buccal: SurfaceState,
    pub lingual: SurfaceState,
}

impl Surfaces {
    pub fn get(&self, surface: Surface) -> &SurfaceState {
        match surface {
            Surface::Mesial => &self.mesial,
            Surface::Distal => &self.distal,
            Surface::Occlusal => &self.occlusal,
            Surface::Buccal => &self.buccal,
            Surface::Lingual => &self.lingual,
        }
    }

    pub fn get_mut(&mut self, surface: Surface) -> &mut SurfaceState {
        match surface {
            Surface::Mesial => &mut self.mesial,
            Surface::Distal => &mut self.distal,
            Surface::Occlusal => &mut self.occlusal,
            Surface::Buccal => &mut self.buccal,
            Surface::Lingual => &mut self.lingual,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Surface, &SurfaceState)> {
        Surface::ALL.into_iter().map(move |s| (s, self.get(s)))
    }

    pub fn all_healthy(&self) -> bool {
        self.iter()
            .all(|(_, state)| state.condition == SurfaceCondition::Healthy)
    }
}

/// Clinical mobility grade (0-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Mobility(u8);

impl Mobility {
    pub fn new(grade: u8) -> Result<Self, ValidationError> {
        if grade <= MAX_MOBILITY_GRADE {
            Ok(Self(grade))
        } else {
            Err(ValidationError(format!(
                "Mobility grade {} exceeds {}",
                grade, MAX_MOBILITY_GRADE
            )))
        }
    }

    pub fn grade(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Mobility {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Mobility> for u8 {
    fn from(mobility: Mobility) -> Self {
        mobility.0
    }
}

/// Sites where pocket depth is probed. Occlusal has no pocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PocketSite {
    Mesial,
    Distal,
    Buccal,
    Lingual,
}

impl PocketSite {
    pub const ALL: [PocketSite; 4] = [
        PocketSite::Mesial,
        PocketSite::Distal,
        PocketSite::Buccal,
        PocketSite::Lingual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PocketSite::Mesial => "mesial",
            PocketSite::Distal => "distal",
            PocketSite::Buccal => "buccal",
            PocketSite::Lingual => "lingual",
        }
    }
}

/// Periodontal pocket depths in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PocketDepths {
    pub mesial: Option<u8>,
    pub distal: Option<u8>,
    pub buccal: Option<u8>,
    pub lingual: Option<u8>,
}

impl PocketDepths {
    /// Build a set of measurements, rejecting anything deeper than 15 mm.
    pub fn new(
        mesial: Option<u8>,
        distal: Option<u8>,
        buccal: Option<u8>,
        lingual: Option<u8>,
    ) -> Result<Self, ValidationError> {
        let depths = Self {
            mesial,
            distal,
            buccal,
            lingual,
        };
        depths.validate()?;
        Ok(depths)
    }

    pub fn get(&self, site: PocketSite) -> Option<u8> {
        match site {
            PocketSite::Mesial => self.mesial,
            PocketSite::Distal => self.distal,
            PocketSite::Buccal => self.buccal,
            PocketSite::Lingual => self.lingual,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for site in PocketSite::ALL {
            if let Some(mm) = self.get(site) {
                if mm > MAX_POCKET_DEPTH_MM {
                    return Err(ValidationError(format!(
                        "Pocket depth {}mm at {} exceeds {}mm",
                        mm,
                        site.as_str(),
                        MAX_POCKET_DEPTH_MM
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Clinical state of one tooth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToothRecord {
    pub number: ToothNumber,
    pub surfaces: Surfaces,
    pub mobility: Mobility,
    pub pocket_depth: PocketDepths,
    pub bleeding: bool,
    pub plaque: bool,
    pub notes: Option<String>,
}

impl ToothRecord {
    /// A tooth with every surface healthy and no periodontal findings.
    pub fn healthy(number: ToothNumber) -> Self {
        Self {
            number,
            surfaces: Surfaces::default(),
            mobility: Mobility::default(),
            pocket_depth: PocketDepths::default(),
            bleeding: false,
            plaque: false,
            notes: None,
        }
    }

    pub fn quadrant(&self) -> Quadrant {
        self.number.quadrant()
    }
}

/// A validated partial change to one tooth.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToothUpdate {
    pub surfaces: Vec<(Surface, SurfaceState)>,
    pub mobility: Option<Mobility>,
    pub pocket_depth: Option<PocketDepths>,
    pub bleeding: Option<bool>,
    pub plaque: Option<bool>,
    pub notes: Option<String>,
}

impl ToothUpdate {
    pub fn surface(mut self, surface: Surface, state: SurfaceState) -> Self {
        self.surfaces.push((surface, state));
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.pocket_depth {
            Some(depths) => depths.validate(),
            None => Ok(()),
        }
    }

    pub fn apply(&self, tooth: &mut ToothRecord) {
        for (surface, state) in &self.surfaces {
            *tooth.surfaces.get_mut(*surface) = state.clone();
        }
        if let Some(mobility) = self.mobility {
            tooth.mobility = mobility;
        }
        if let Some(depths) = self.pocket_depth {
            tooth.pocket_depth = depths;
        }
        if let Some(bleeding) = self.bleeding {
            tooth.bleeding = bleeding;
        }
        if let Some(plaque) = self.plaque {
            tooth.plaque = plaque;
        }
        if self.notes.is_some() {
            tooth.notes = self.notes.clone();
        }
    }
}
