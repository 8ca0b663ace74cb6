//! Resolving a pixel to a point in the world.

use glam::{DVec2, DVec3};
use tracing::trace;
use vantage_data::finite_min_max_iter;

use crate::render_state::{DepthImage, DrawLayerRenderState};

/// Maps a pixel of the last rendered frame to the world-frame point under it.
pub trait DepthSampler {
    fn sample_in_world(&self, pixel: DVec2, render_state: &DrawLayerRenderState) -> Option<DVec3>;
}

/// Uses the nearest depth sample around the pixel, and falls back to
/// intersecting the pixel's ray with a ground plane `normal · x = offset`.
#[derive(Debug, Clone)]
pub struct GroundPlaneDepthSampler {
    search_radius: u32,
    ground_normal: DVec3,
    ground_offset: f64,
}

impl GroundPlaneDepthSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Half width, in pixels, of the window searched in the depth image.
    pub fn with_search_radius(mut self, radius: u32) -> Self {
        self.search_radius = radius;
        self
    }

    pub fn with_ground_plane(mut self, normal: DVec3, offset: f64) -> Self {
        self.ground_normal = normal.normalize_or_zero();
        self.ground_offset = offset;
        self
    }

    /// Nearest positive, finite depth in the window around `pixel`.
    fn depth_near(&self, pixel: DVec2, depth: &DepthImage) -> Option<f64> {
        let (width, height) = depth.dimensions();
        if width == 0 || height == 0 || !pixel.is_finite() {
            return None;
        }
        let x = pixel.x.round();
        let y = pixel.y.round();
        let r = f64::from(self.search_radius);
        let (max_x, max_y) = (f64::from(width - 1), f64::from(height - 1));
        if x + r < 0.0 || y + r < 0.0 || x - r > max_x || y - r > max_y {
            return None;
        }
        let x0 = (x - r).max(0.0) as u32;
        let y0 = (y - r).max(0.0) as u32;
        let x1 = ((x + r) as u32).min(width - 1);
        let y1 = ((y + r) as u32).min(height - 1);

        let samples = (y0..=y1)
            .flat_map(|y| (x0..=x1).map(move |x| (x, y)))
            .map(|(x, y)| depth.get_pixel(x, y).0[0])
            .filter(|z| *z > 0.0);
        let range = finite_min_max_iter(samples);
        (!range.is_empty()).then(|| f64::from(range.min()))
    }

    fn intersect_ground(&self, origin: DVec3, direction: DVec3) -> Option<DVec3> {
        let denom = self.ground_normal.dot(direction);
        if denom.abs() <= 1e-9 {
            return None;
        }
        let t = (self.ground_offset - self.ground_normal.dot(origin)) / denom;
        (t > 0.0).then(|| origin + direction * t)
    }
}

impl Default for GroundPlaneDepthSampler {
    fn default() -> Self {
        Self {
            search_radius: 2,
            ground_normal: DVec3::Z,
            ground_offset: 0.0,
        }
    }
}

impl DepthSampler for GroundPlaneDepthSampler {
    fn sample_in_world(&self, pixel: DVec2, render_state: &DrawLayerRenderState) -> Option<DVec3> {
        let ray = render_state.projection.unproject(pixel)?;
        let world_from_cam = render_state.cam_from_world.inverse();

        if let Some(z) = render_state
            .depth
            .as_ref()
            .and_then(|depth| self.depth_near(pixel, depth))
        {
            if let Some(point) = ray.point_at_depth(z) {
                trace!(?pixel, z, "depth sample hit");
                return Some(world_from_cam.transform_point3(point));
            }
        }

        let origin = world_from_cam.transform_point3(ray.origin);
        let direction = world_from_cam.transform_vector3(ray.direction);
        let hit = self.intersect_ground(origin, direction);
        trace!(?pixel, ?hit, "ground plane fallback");
        hit
    }
}
