//! Core types shared across the pipeline

use crate::error::{Result, TileVizError};
use image::{GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Foreground value written into binary masks
pub const MASK_FOREGROUND: u8 = 255;

/// Room category predicted by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomType {
    Kitchen,
    Bathroom,
    #[serde(rename = "Living Room")]
    LivingRoom,
    Bedroom,
    #[serde(rename = "Dining Room")]
    DiningRoom,
    Balcony,
}

impl RoomType {
    /// Label table in classifier output order
    pub const ALL: [RoomType; 6] = [
        Self::Kitchen,
        Self::Bathroom,
        Self::LivingRoom,
        Self::Bedroom,
        Self::DiningRoom,
        Self::Balcony,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Kitchen => "Kitchen",
            Self::Bathroom => "Bathroom",
            Self::LivingRoom => "Living Room",
            Self::Bedroom => "Bedroom",
            Self::DiningRoom => "Dining Room",
            Self::Balcony => "Balcony",
        }
    }

    /// Class index to label, `None` past the end of the table
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl std::fmt::Display for RoomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for RoomType {
    type Err = TileVizError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|room| {
                room.label().eq_ignore_ascii_case(wanted)
                    || room.label().replace(' ', "").eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| TileVizError::invalid_input(format!("Unknown room type: {s}")))
    }
}

/// Which mask receives the segmentation map for a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfacePolicy {
    /// Map goes to the wall mask, floor mask is empty
    WallDominant,
    /// Map goes to the floor mask, wall mask is empty
    FloorDominant,
}

impl SurfacePolicy {
    /// Living rooms, bedrooms and dining rooms are tiled as floors
    #[must_use]
    pub fn for_room(room: RoomType) -> Self {
        match room {
            RoomType::LivingRoom | RoomType::Bedroom | RoomType::DiningRoom => Self::FloorDominant,
            RoomType::Kitchen | RoomType::Bathroom | RoomType::Balcony => Self::WallDominant,
        }
    }

    /// Assign a binary map to one mask and blank the other: `(wall, floor)`
    #[must_use]
    pub fn split(self, map: GrayImage) -> (GrayImage, GrayImage) {
        let empty = GrayImage::from_pixel(map.width(), map.height(), Luma([0]));
        match self {
            Self::WallDominant => (map, empty),
            Self::FloorDominant => (empty, map),
        }
    }
}

/// Surface kind a mask or material refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Wall,
    Floor,
}

impl std::fmt::Display for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wall => f.write_str("wall"),
            Self::Floor => f.write_str("floor"),
        }
    }
}

/// Wall and floor masks for one photo
#[derive(Debug, Clone)]
pub struct SegmentationResult {
    pub room_type: RoomType,
    pub wall_mask: GrayImage,
    pub floor_mask: GrayImage,
}

impl SegmentationResult {
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.wall_mask.dimensions()
    }

    #[must_use]
    pub fn mask(&self, surface: Surface) -> &GrayImage {
        match surface {
            Surface::Wall => &self.wall_mask,
            Surface::Floor => &self.floor_mask,
        }
    }

    /// No pixel is foreground in both masks
    #[must_use]
    pub fn masks_exclusive(&self) -> bool {
        self.wall_mask
            .pixels()
            .zip(self.floor_mask.pixels())
            .all(|(w, f)| w.0[0] == 0 || f.0[0] == 0)
    }
}

/// Axis-aligned pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    #[must_use]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x - self.x < self.width && y - self.y < self.height
    }
}

/// One connected foreground component of a mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceRegion {
    pub surface: Surface,
    pub bounds: Rect,
}

/// What was applied to one surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum SurfaceMaterial {
    /// Catalog tile id
    Texture(String),
    /// Flat paint, `#rrggbb`
    Color(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedSurfaces {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wall: Option<SurfaceMaterial>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor: Option<SurfaceMaterial>,
}

/// A rendered variant of a segmented photo
#[derive(Debug, Clone)]
pub struct CompositedImage {
    pub segmentation_id: Option<Uuid>,
    pub applied: AppliedSurfaces,
    pub image: RgbImage,
    pub output_path: Option<PathBuf>,
    pub timings: ProcessingTimings,
}

/// Wall-clock time spent per pipeline stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    pub image_decode_ms: u64,
    /// Texture alignment, when enabled
    pub alignment_ms: u64,
    pub compositing_ms: u64,
    /// Encoding and writing the output file
    pub image_encode_ms: Option<u64>,
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// Share of the total spent compositing
    #[must_use]
    pub fn compositing_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            self.compositing_ms as f64 / self.total_ms as f64
        }
    }
}

/// An RGB color, optionally named
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorSample {
    pub rgb: [u8; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ColorSample {
    #[must_use]
    pub fn from_rgb(rgb: [u8; 3]) -> Self {
        Self { rgb, name: None }
    }

    /// Parse `#RRGGBB` or `RRGGBB`, case-insensitive
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TileVizError::invalid_color(hex));
        }
        let channel = |range: std::ops::Range<usize>| {
            digits
                .get(range)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| TileVizError::invalid_color(hex))
        };
        Ok(Self::from_rgb([channel(0..2)?, channel(2..4)?, channel(4..6)?]))
    }

    #[must_use]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Lowercase `#rrggbb`
    #[must_use]
    pub fn to_hex(&self) -> String {
        let [r, g, b] = self.rgb;
        format!("#{r:02x}{g:02x}{b:02x}")
    }

    /// Euclidean distance in RGB space
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        f64::from(self.squared_distance(other)).sqrt()
    }

    #[must_use]
    pub fn squared_distance(&self, other: &Self) -> u32 {
        self.rgb
            .iter()
            .zip(other.rgb.iter())
            .map(|(&a, &b)| {
                let d = i32::from(a) - i32::from(b);
                d.unsigned_abs() * d.unsigned_abs()
            })
            .sum()
    }
}

impl std::fmt::Display for ColorSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A catalog item and its distance to the reference color
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorMatch {
    pub item_id: String,
    pub color: ColorSample,
    pub score: f64,
}

/// Matches ordered by non-decreasing score
pub type MatchRanking = Vec<ColorMatch>;

/// Representative color of a tile photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DominantColor {
    pub hex: String,
    pub name: String,
}

/// Tone transform applied by the lighting adjuster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightingMode {
    Daylight,
    Warm,
    Cool,
    Dimmed,
    Custom { brightness: u8, contrast: u8 },
}

impl LightingMode {
    /// Resolve a mode name; anything but an exact preset name selects `Custom`
    ///
    /// # Errors
    /// - `brightness` or `contrast` above 100
    pub fn parse(mode: &str, brightness: u8, contrast: u8) -> Result<Self> {
        for (name, value) in [("brightness", brightness), ("contrast", contrast)] {
            if value > 100 {
                return Err(TileVizError::invalid_input(format!(
                    "{name} must be in 0-100, got {value}"
                )));
            }
        }
        let resolved = match mode {
            "daylight" => Self::Daylight,
            "warm" => Self::Warm,
            "cool" => Self::Cool,
            "dimmed" => Self::Dimmed,
            other => {
                tracing::debug!(mode = %other, brightness, contrast, "using custom lighting");
                Self::Custom {
                    brightness,
                    contrast,
                }
            },
        };
        Ok(resolved)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Daylight => "daylight",
            Self::Warm => "warm",
            Self::Cool => "cool",
            Self::Dimmed => "dimmed",
            Self::Custom { .. } => "custom",
        }
    }
}

/// Lighting parameters as received from a caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightingRequest {
    pub mode: String,
    #[serde(default = "default_level")]
    pub brightness: u8,
    #[serde(default = "default_level")]
    pub contrast: u8,
}

fn default_level() -> u8 {
    50
}

impl LightingRequest {
    #[must_use]
    pub fn new<S: Into<String>>(mode: S) -> Self {
        Self {
            mode: mode.into(),
            brightness: default_level(),
            contrast: default_level(),
        }
    }

    pub fn resolve(&self) -> Result<LightingMode> {
        LightingMode::parse(&self.mode, self.brightness, self.contrast)
    }
}
