use glam::DMat4;
use image::{ImageBuffer, Luma};

use crate::projection::ProjectionModel;

/// Per-pixel camera-frame `z` of the nearest surface. Non-finite samples
/// mean nothing was hit.
pub type DepthImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// What the renderer drew for the last frame of a layer. Handlers resolve
/// cursor positions against this rather than the live (possibly animating)
/// camera.
#[derive(Debug, Clone, Default)]
pub struct DrawLayerRenderState {
    pub cam_from_world: DMat4,
    pub projection: ProjectionModel,
    pub depth: Option<DepthImage>,
}

impl DrawLayerRenderState {
    pub fn new(cam_from_world: DMat4, projection: ProjectionModel) -> Self {
        Self {
            cam_from_world,
            projection,
            depth: None,
        }
    }

    pub fn with_depth(mut self, depth: DepthImage) -> Self {
        self.depth = Some(depth);
        self
    }
}
