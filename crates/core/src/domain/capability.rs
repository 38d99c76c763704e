// Capability and output format enumerations

use serde::{Deserialize, Serialize};

/// A feature a backend declares support for.
///
/// A backend is eligible for a job iff its capability set is a superset of
/// the job's required capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ImageToVideo,
    TextToVideo,
    VideoExtension,
    StyleTransfer,
    CameraControl,
    MotionControl,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::ImageToVideo => write!(f, "image_to_video"),
            Capability::TextToVideo => write!(f, "text_to_video"),
            Capability::VideoExtension => write!(f, "video_extension"),
            Capability::StyleTransfer => write!(f, "style_transfer"),
            Capability::CameraControl => write!(f, "camera_control"),
            Capability::MotionControl => write!(f, "motion_control"),
        }
    }
}

/// Output quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    FullHd1080,
    #[serde(rename = "4k")]
    Uhd4k,
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Quality::Hd720 => write!(f, "720p"),
            Quality::FullHd1080 => write!(f, "1080p"),
            Quality::Uhd4k => write!(f, "4k"),
        }
    }
}

/// Output aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "1:1")]
    Square,
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AspectRatio::Landscape => write!(f, "16:9"),
            AspectRatio::Portrait => write!(f, "9:16"),
            AspectRatio::Square => write!(f, "1:1"),
        }
    }
}
