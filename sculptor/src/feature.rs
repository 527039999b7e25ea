use derive_more::Display;
use serde::{Deserialize, Serialize};
use structopt::StructOpt;

use crate::raster::{ColourKey, Point2i};
use crate::trace::{Direction::*, ScanOrder};

#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum Feature {
    Eye,
    NoseBridge,
    Nose,
    Mouth,
    MouthLoop,
    Eyebrow,
    Ear,
    SideProfile,
    FrontProfile,
}

/// Point of a traced ring the scanned sequence is rotated to start from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartTieBreak {
    LowestX,
    LowestY,
    HighestX,
    HighestY,
}

/// How a feature is located on the overlay images.
#[derive(Clone, Copy, Debug)]
pub struct ScanSettings {
    pub colour: ColourKey,
    pub start: Point2i,
    pub order: ScanOrder,
    pub is_ring: bool,
    pub tie_break: StartTieBreak,
}

pub const EAR_POINTS: usize = 5;
pub const SIDE_PROFILE_POINTS: usize = 96;
pub const FRONT_PROFILE_POINTS: usize = 25;

impl Feature {
    pub const ALL: [Feature; 9] = [
        Feature::Eye,
        Feature::NoseBridge,
        Feature::Nose,
        Feature::Mouth,
        Feature::MouthLoop,
        Feature::Eyebrow,
        Feature::Ear,
        Feature::SideProfile,
        Feature::FrontProfile,
    ];

    pub fn scan_settings(self) -> ScanSettings {
        use StartTieBreak::*;

        let (colour, row, column, is_ring, tie_break) = match self {
            Feature::Eye => ((255, 0, 0), DownUp, LeftRight, true, LowestY),
            Feature::NoseBridge => {
                ((255, 255, 0), LeftRight, DownUp, false, LowestY)
            }
            Feature::Nose => ((0, 255, 0), DownUp, LeftRight, false, HighestY),
            Feature::Mouth => ((0, 0, 255), LeftRight, DownUp, true, LowestY),
            Feature::MouthLoop => {
                ((255, 0, 255), LeftRight, DownUp, false, HighestY)
            }
            Feature::Eyebrow => {
                ((0, 255, 255), LeftRight, DownUp, false, LowestX)
            }
            Feature::Ear => ((178, 77, 0), LeftRight, DownUp, false, HighestY),
            Feature::SideProfile => {
                ((0, 0, 0), LeftRight, DownUp, true, LowestY)
            }
            Feature::FrontProfile => {
                ((0, 128, 128), LeftRight, DownUp, false, LowestX)
            }
        };

        ScanSettings {
            colour: ColourKey::new(colour.0, colour.1, colour.2),
            start: Point2i::new(0, 0),
            order: ScanOrder { row, column },
            is_ring,
            tie_break,
        }
    }

    /// Number of points per scanned instance.
    pub fn points(self, resolution: &ResolutionParams) -> usize {
        match self {
            Feature::Eye => resolution.eye,
            Feature::NoseBridge => resolution.nose_bridge,
            Feature::Nose => resolution.nose,
            Feature::Mouth => resolution.mouth,
            Feature::MouthLoop => resolution.mouth_loop,
            Feature::Eyebrow => resolution.eyebrow,
            Feature::Ear => EAR_POINTS,
            Feature::SideProfile => SIDE_PROFILE_POINTS,
            Feature::FrontProfile => FRONT_PROFILE_POINTS,
        }
    }

    /// Tells whether scanned instances are numbered right-to-left on the
    /// model while the image scan meets them left-to-right.
    pub fn is_mirrored(self) -> bool {
        matches!(self, Feature::Eye | Feature::Ear)
    }
}

/// Control point counts per feature.
#[derive(Clone, Debug, PartialEq, Eq, StructOpt, Serialize, Deserialize)]
pub struct ResolutionParams {
    #[structopt(help = "Eye control points", long, default_value = "16")]
    pub eye: usize,

    #[structopt(help = "Mouth control points", long, default_value = "24")]
    pub mouth: usize,

    #[structopt(
        help = "Mouth loop control points",
        long,
        default_value = "16"
    )]
    pub mouth_loop: usize,

    #[structopt(help = "Nose control points", long, default_value = "8")]
    pub nose: usize,

    #[structopt(help = "Eyebrow control points", long, default_value = "16")]
    pub eyebrow: usize,

    #[structopt(
        help = "Nose bridge control points",
        long,
        default_value = "4"
    )]
    pub nose_bridge: usize,
}

impl Default for ResolutionParams {
    fn default() -> Self {
        Self {
            eye: 16,
            mouth: 24,
            mouth_loop: 16,
            nose: 8,
            eyebrow: 16,
            nose_bridge: 4,
        }
    }
}

/// Index of the first point that wins the tie-break.
pub fn tie_break_index(points: &[Point2i], tie_break: StartTieBreak) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, p) in points.iter().enumerate() {
        let better = match best.map(|b| points[b]) {
            None => true,
            Some(b) => match tie_break {
                StartTieBreak::LowestX => p.x < b.x,
                StartTieBreak::LowestY => p.y < b.y,
                StartTieBreak::HighestX => p.x > b.x,
                StartTieBreak::HighestY => p.y > b.y,
            },
        };
        if better {
            best = Some(i);
        }
    }
    best
}

/// Rotates a traced ring so that it starts at the tie-break point.
pub fn rearrange(mut ring: Vec<Point2i>, tie_break: StartTieBreak) -> Vec<Point2i> {
    if let Some(i) = tie_break_index(&ring, tie_break) {
        ring.rotate_left(i);
    }
    ring
}
