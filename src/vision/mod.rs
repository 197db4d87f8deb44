//! Image analysis and compositing stages

pub mod aligner;
pub mod classifier;
pub mod color;
pub mod compositor;
pub mod features;
pub mod homography;
pub mod lighting;
mod palette;
pub mod segmenter;
pub mod tile_prep;

pub use aligner::{AlignedTexture, TileAligner};
pub use classifier::RoomClassifier;
pub use color::{closest_color_name, ColorMatcher, DominantColorExtractor, MatchCandidate};
pub use compositor::{SurfaceCompositor, SurfaceTextures};
pub use lighting::LightingAdjuster;
pub use segmenter::SurfaceSegmenter;
