use serde::{Deserialize, Serialize};

/// Camera pose in world space as reported by the AR tracker.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraPose {
    pub translation: [f32; 3],
    /// Quaternion (x, y, z, w)
    pub rotation: [f32; 4],
}

impl CameraPose {
    pub fn new(translation: [f32; 3], rotation: [f32; 4]) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn identity() -> Self {
        Self::new([0.0; 3], [0.0, 0.0, 0.0, 1.0])
    }
}

/// Everything the AR tracker hands over for one camera frame.
///
/// Matrices are 4x4, column-major (OpenGL layout).
#[derive(Debug, Clone, PartialEq)]
pub struct ArFrame {
    pub timestamp_ns: i64,
    pub pose: CameraPose,
    pub view_matrix: [f32; 16],
    pub projection_matrix: [f32; 16],
    pub tracking_state: String,
    /// Flat (x, y, z, confidence) quadruples.
    pub point_cloud: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Pixel position, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}
