//! World-to-screen projection of the tracker's feature points.
//!
//! Stateless; everything needed comes in with the frame.

use crate::frame::{ArFrame, ScreenPoint, ScreenSize};
use nalgebra::{Matrix4, Perspective3, Vector4};

/// Floats per point-cloud entry: x, y, z, confidence.
pub const POINT_STRIDE: usize = 4;

/// Clip-space w below this magnitude cannot be divided through.
const MIN_CLIP_W: f32 = 1e-6;

/// Result of projecting one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameProjection {
    pub feature_count: usize,
    pub tracking_state: String,
    /// Present only when visualization is enabled.
    pub points: Option<Vec<ScreenPoint>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameProjector;

impl FrameProjector {
    pub fn new() -> Self {
        FrameProjector
    }

    /// Project a world point to pixel coordinates.
    ///
    /// Returns `None` when the point lands on the camera plane (w ~ 0) or the
    /// divide produces a non-finite coordinate.
    pub fn project(
        &self,
        world_point: [f32; 3],
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
        screen: ScreenSize,
    ) -> Option<ScreenPoint> {
        let homogeneous = Vector4::new(world_point[0], world_point[1], world_point[2], 1.0);
        let camera_space = view * homogeneous;
        let clip = projection * camera_space;

        if !clip.w.is_finite() || clip.w.abs() < MIN_CLIP_W {
            return None;
        }

        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;

        // NDC origin is bottom-left, screen origin is top-left.
        let screen_x = (ndc_x + 1.0) * screen.width as f32 * 0.5;
        let screen_y = (1.0 - ndc_y) * screen.height as f32 * 0.5;

        if !screen_x.is_finite() || !screen_y.is_finite() {
            return None;
        }

        Some(ScreenPoint {
            x: screen_x as i32,
            y: screen_y as i32,
        })
    }

    /// Number of points in a flat stride-4 buffer.
    pub fn count_features(&self, point_cloud: &[f32]) -> usize {
        point_cloud.len() / POINT_STRIDE
    }

    /// Project every complete point in the buffer, dropping unprojectable ones.
    pub fn project_cloud(
        &self,
        point_cloud: &[f32],
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
        screen: ScreenSize,
    ) -> Vec<ScreenPoint> {
        point_cloud
            .chunks_exact(POINT_STRIDE)
            .filter_map(|p| self.project([p[0], p[1], p[2]], view, projection, screen))
            .collect()
    }

    pub fn process(&self, frame: &ArFrame, screen: ScreenSize, visualize: bool) -> FrameProjection {
        let points = if visualize {
            let view = Matrix4::from_column_slice(&frame.view_matrix);
            let projection = Matrix4::from_column_slice(&frame.projection_matrix);
            Some(self.project_cloud(&frame.point_cloud, &view, &projection, screen))
        } else {
            None
        };

        FrameProjection {
            feature_count: self.count_features(&frame.point_cloud),
            tracking_state: frame.tracking_state.clone(),
            points,
        }
    }
}

/// Symmetric OpenGL perspective matrix, column-major.
pub fn perspective(fovy_rad: f32, aspect: f32, near: f32, far: f32) -> [f32; 16] {
    let matrix = Perspective3::new(aspect, fovy_rad, near, far).to_homogeneous();
    to_column_array(&matrix)
}

pub fn to_column_array(matrix: &Matrix4<f32>) -> [f32; 16] {
    let mut out = [0.0f32; 16];
    out.copy_from_slice(matrix.as_slice());
    out
}
