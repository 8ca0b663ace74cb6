//! Turning input events into camera motion.

use std::fmt;
use std::rc::Rc;

use glam::{DMat3, DMat4, DVec2, DVec3, DVec4};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use vantage_data::{MinMax, Renderable};

use crate::camera::CameraPose;
use crate::depth_sampler::{DepthSampler, GroundPlaneDepthSampler};
use crate::draw_layer::DrawLayer;
use crate::input::{Context, Event, EventKind, Key, PointerButton};
use crate::projection::{NonLinearMethod, ProjectionModel};
use crate::render_state::DrawLayerRenderState;

/// Depth used for the pivot when neither the depth sampler nor the scene
/// bounds give one.
const FALLBACK_PIVOT_DEPTH: f64 = 10.0;
/// Seconds taken by discrete jumps (recentre, fit to scene).
const JUMP_SECONDS: f64 = 0.3;

/// How a handler interprets input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// Orbit, pan and dolly in 3D around the point under the cursor.
    Freeview,
    /// Pan and zoom a flat image; never rotates.
    ImagePlane,
    /// Pick one of the above from the projection and content.
    #[default]
    BestGuess,
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewMode::Freeview => write!(f, "freeview"),
            ViewMode::ImagePlane => write!(f, "image_plane"),
            ViewMode::BestGuess => write!(f, "best_guess"),
        }
    }
}

/// Input strategy attached to a [`DrawLayer`].
pub trait DrawLayerHandler {
    /// Interpret one event. `clip_from_window` and `pixel_from_window` map
    /// window positions (2D homogeneous) into the layer's clip space and
    /// image pixels; `clip_aspect_scale` corrects clip units for a
    /// non-square viewport. Returns whether the event was consumed.
    #[allow(clippy::too_many_arguments)]
    fn handle_event(
        &mut self,
        context: &Context,
        event: &Event,
        clip_from_window: DMat3,
        pixel_from_window: DMat3,
        clip_aspect_scale: DVec2,
        layer: &mut DrawLayer,
        render_state: &DrawLayerRenderState,
    ) -> bool;

    fn view_mode(&self) -> ViewMode;

    /// Changes how later events are read. Never moves the camera.
    fn set_view_mode(&mut self, mode: ViewMode);
}

/// Construction parameters for a [`ViewHandler`].
#[derive(Clone)]
pub struct HandlerParams {
    pub depth_sampler: Rc<dyn DepthSampler>,
    pub up_in_world: DVec3,
    /// Box the camera centre is kept in. Empty means unbounded.
    pub camera_limits_in_world: MinMax<DVec3>,
    pub view_mode: ViewMode,
}

impl Default for HandlerParams {
    fn default() -> Self {
        Self {
            depth_sampler: Rc::new(GroundPlaneDepthSampler::default()),
            up_in_world: DVec3::Z,
            camera_limits_in_world: MinMax::default(),
            view_mode: ViewMode::BestGuess,
        }
    }
}

impl fmt::Debug for HandlerParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerParams")
            .field("up_in_world", &self.up_in_world)
            .field("camera_limits_in_world", &self.camera_limits_in_world)
            .field("view_mode", &self.view_mode)
            .finish_non_exhaustive()
    }
}

impl HandlerParams {
    pub fn with_depth_sampler(mut self, sampler: Rc<dyn DepthSampler>) -> Self {
        self.depth_sampler = sampler;
        self
    }

    pub fn with_up_in_world(mut self, up: DVec3) -> Self {
        self.up_in_world = up;
        self
    }

    pub fn with_camera_limits_in_world(mut self, limits: MinMax<DVec3>) -> Self {
        self.camera_limits_in_world = limits;
        self
    }

    pub fn with_view_mode(mut self, mode: ViewMode) -> Self {
        self.view_mode = mode;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragMode {
    Orbit,
    Pan,
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    mode: DragMode,
    button: PointerButton,
    last_clip: DVec2,
    pivot: DVec3,
    /// Pose when the button went down, restored if the drag is cancelled.
    start: CameraPose,
}

/// Default handler: orbit/pan/dolly for 3D scenes, pan/zoom for images.
#[derive(Debug)]
pub struct ViewHandler {
    params: HandlerParams,
    drag: Option<DragState>,
    rotation_sensitivity: f64,
    zoom_per_step: f64,
}

impl ViewHandler {
    pub fn new(params: HandlerParams) -> Self {
        Self {
            params,
            drag: None,
            rotation_sensitivity: std::f64::consts::FRAC_PI_2,
            zoom_per_step: 0.9,
        }
    }

    /// Radians of orbit per clip-space unit of drag.
    pub fn rotation_sensitivity(&mut self, value: f64) -> &mut Self {
        self.rotation_sensitivity = value;
        self
    }

    /// Distance factor per scroll step; below 1 moves in on positive scroll.
    pub fn zoom_per_step(&mut self, value: f64) -> &mut Self {
        self.zoom_per_step = value;
        self
    }

    pub fn params(&self) -> &HandlerParams {
        &self.params
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// The mode events are read in for this layer right now.
    pub fn effective_mode(&self, layer: &DrawLayer) -> ViewMode {
        match self.params.view_mode {
            ViewMode::BestGuess => {
                if layer.projection().is_near_orthographic() || content_is_images(layer) {
                    ViewMode::ImagePlane
                } else {
                    ViewMode::Freeview
                }
            }
            mode => mode,
        }
    }

    /// World point the gesture at `pixel` acts around.
    fn resolve_pivot(
        &self,
        pixel: DVec2,
        pose: &CameraPose,
        projection: &ProjectionModel,
        layer: &DrawLayer,
        render_state: &DrawLayerRenderState,
    ) -> DVec3 {
        if let Some(point) = self.params.depth_sampler.sample_in_world(pixel, render_state) {
            if point.is_finite() {
                return point;
            }
        }

        let bounds = layer.scene_bounds_in_world();
        let bounds_depth = (!bounds.is_empty())
            .then(|| pose.cam_from_world().transform_point3(bounds.center()).z)
            .filter(|z| z.is_finite() && *z > 0.0);
        let depth = bounds_depth.unwrap_or(FALLBACK_PIVOT_DEPTH);
        projection
            .unproject(pixel)
            .and_then(|ray| ray.point_at_depth(depth))
            .map(|point| pose.world_from_cam().transform_point3(point))
            .unwrap_or_else(|| pose.center() + pose.forward() * depth)
    }

    /// Pose that keeps `pivot` under `pixel`, by translating in the camera
    /// plane.
    fn pan_to(
        pose: &CameraPose,
        projection: &ProjectionModel,
        pivot: DVec3,
        pixel: DVec2,
    ) -> Option<CameraPose> {
        let pivot_in_cam = pose.cam_from_world().transform_point3(pivot);
        let target = projection.unproject(pixel)?.point_at_depth(pivot_in_cam.z)?;
        Some(pose.translated_in_camera(target - pivot_in_cam))
    }

    fn clamp(&self, pose: CameraPose) -> CameraPose {
        let center = pose.center();
        let clamped = self.params.camera_limits_in_world.clamp(center);
        if clamped == center {
            return pose;
        }
        trace!(?center, ?clamped, "camera clamped to limits");
        pose.with_center(clamped)
    }

    fn write(&self, layer: &mut DrawLayer, pose: CameraPose, duration_seconds: f64) -> bool {
        let pose = self.clamp(pose);
        if !pose.is_finite() {
            debug!("dropping non-finite camera update");
            return false;
        }
        layer.set_cam_from_world(pose.cam_from_world(), duration_seconds);
        true
    }

    fn on_drag(
        &mut self,
        clip: DVec2,
        pixel: DVec2,
        clip_aspect_scale: DVec2,
        pose: &CameraPose,
        projection: &ProjectionModel,
        layer: &mut DrawLayer,
    ) -> bool {
        let Some(drag) = self.drag.as_mut() else {
            return false;
        };
        let delta = (clip - drag.last_clip) * clip_aspect_scale;
        drag.last_clip = clip;
        let drag = *drag;

        let moved = match drag.mode {
            DragMode::Orbit => Some(pose.orbit(
                drag.pivot,
                self.params.up_in_world,
                -delta.x * self.rotation_sensitivity,
                delta.y * self.rotation_sensitivity,
            )),
            DragMode::Pan => Self::pan_to(pose, projection, drag.pivot, pixel),
        };
        if let Some(moved) = moved {
            self.write(layer, moved, 0.0);
        }
        true
    }

    #[allow(clippy::too_many_arguments)]
    fn on_scroll(
        &self,
        pixel: DVec2,
        amount: f64,
        mode: ViewMode,
        pose: &CameraPose,
        projection: &ProjectionModel,
        layer: &mut DrawLayer,
        render_state: &DrawLayerRenderState,
    ) -> bool {
        let factor = self.zoom_per_step.powf(amount);
        if !factor.is_finite() || factor <= 0.0 {
            return false;
        }

        if mode == ViewMode::ImagePlane
            && matches!(projection.non_linear, NonLinearMethod::Linear)
            && projection.is_near_orthographic()
        {
            // Moving an orthographic camera does not change the image, so
            // zoom the intrinsics about the cursor instead.
            let zoomed = ProjectionModel::new(
                zoom_about(pixel, 1.0 / factor) * projection.intrinsic_k,
                NonLinearMethod::Linear,
            );
            layer.set_projection(zoomed, 0.0);
            return true;
        }

        let pivot = self.resolve_pivot(pixel, pose, projection, layer, render_state);
        self.write(layer, pose.dolly_towards(pivot, factor), 0.0)
    }

    fn on_double_click(
        &self,
        pixel: DVec2,
        mode: ViewMode,
        pose: &CameraPose,
        projection: &ProjectionModel,
        layer: &mut DrawLayer,
        render_state: &DrawLayerRenderState,
    ) -> bool {
        let target = self.resolve_pivot(pixel, pose, projection, layer, render_state);
        let recentred = match mode {
            ViewMode::ImagePlane => {
                let in_cam = pose.cam_from_world().transform_point3(target);
                pose.translated_in_camera(DVec3::new(-in_cam.x, -in_cam.y, 0.0))
            }
            _ => CameraPose::looking(
                pose.center(),
                target - pose.center(),
                self.params.up_in_world,
            )
            .unwrap_or(*pose),
        };
        debug!(?target, %mode, "recentre");
        self.write(layer, recentred, JUMP_SECONDS)
    }

    /// Frame the scene bounds, keeping the current view direction.
    fn fit_scene(
        &self,
        context: &Context,
        pixel_from_window: DMat3,
        mode: ViewMode,
        pose: &CameraPose,
        projection: &ProjectionModel,
        layer: &mut DrawLayer,
    ) -> bool {
        let bounds = layer.scene_bounds_in_world();
        if bounds.is_empty() {
            return false;
        }
        let center = bounds.center();
        let radius = (bounds.size().length() * 0.5).max(f64::EPSILON);

        // Half the vertical field of view, measured from the rays through
        // the window centre and its top edge.
        let window_center = context.window_size * 0.5;
        let half_fov = [window_center, DVec2::new(window_center.x, 0.0)]
            .map(|p| projection.unproject(pixel_from_window.transform_point2(p)));
        let distance = match half_fov {
            [Some(a), Some(b)] => {
                let angle = a.direction.angle_between(b.direction);
                if angle > 1e-6 { radius / angle.sin() } else { 2.0 * radius }
            }
            _ => 2.0 * radius,
        };

        let forward = pose.forward();
        let camera_center = center - forward * distance;
        let fitted = match mode {
            ViewMode::Freeview => {
                CameraPose::looking(camera_center, forward, self.params.up_in_world)
                    .unwrap_or_else(|| pose.with_center(camera_center))
            }
            _ => pose.with_center(camera_center),
        };
        debug!(?center, radius, distance, "fit scene");
        self.write(layer, fitted, JUMP_SECONDS)
    }
}

impl Default for ViewHandler {
    fn default() -> Self {
        Self::new(HandlerParams::default())
    }
}

impl DrawLayerHandler for ViewHandler {
    fn handle_event(
        &mut self,
        context: &Context,
        event: &Event,
        clip_from_window: DMat3,
        pixel_from_window: DMat3,
        clip_aspect_scale: DVec2,
        layer: &mut DrawLayer,
        render_state: &DrawLayerRenderState,
    ) -> bool {
        if !is_invertible(clip_from_window) || !is_invertible(pixel_from_window) {
            debug!("degenerate window transform, event ignored");
            return false;
        }
        let pose = CameraPose::new(layer.cam_from_world());
        if !pose.is_finite() {
            debug!("degenerate camera pose, event ignored");
            return false;
        }
        let clip = clip_from_window.transform_point2(event.position);
        let pixel = pixel_from_window.transform_point2(event.position);
        let inside = clip.abs().cmple(DVec2::ONE).all();
        let projection = layer.projection();
        let mode = self.effective_mode(layer);

        match event.kind {
            EventKind::PointerDown { button } => {
                if !inside {
                    return false;
                }
                let drag_mode = match (mode, button) {
                    (ViewMode::Freeview, PointerButton::Primary) => DragMode::Orbit,
                    _ => DragMode::Pan,
                };
                let pivot = self.resolve_pivot(pixel, &pose, &projection, layer, render_state);
                trace!(?pivot, ?drag_mode, "drag started");
                self.drag = Some(DragState {
                    mode: drag_mode,
                    button,
                    last_clip: clip,
                    pivot,
                    start: pose,
                });
                true
            }
            EventKind::PointerMove => {
                self.on_drag(clip, pixel, clip_aspect_scale, &pose, &projection, layer)
            }
            EventKind::PointerUp { button } => match self.drag {
                Some(drag) if drag.button == button => {
                    self.drag = None;
                    true
                }
                _ => false,
            },
            EventKind::Scroll { delta } => {
                if !inside || delta.y == 0.0 {
                    return false;
                }
                self.on_scroll(pixel, delta.y, mode, &pose, &projection, layer, render_state)
            }
            EventKind::DoubleClick { .. } => {
                if !inside {
                    return false;
                }
                self.on_double_click(pixel, mode, &pose, &projection, layer, render_state)
            }
            EventKind::Key {
                key: Key::Home | Key::R,
                pressed: true,
            } => self.fit_scene(context, pixel_from_window, mode, &pose, &projection, layer),
            EventKind::Key {
                key: Key::Escape,
                pressed: true,
            } => match self.drag.take() {
                Some(drag) => {
                    debug!("drag cancelled");
                    self.write(layer, drag.start, 0.0)
                }
                None => false,
            },
            EventKind::Key { .. } => false,
        }
    }

    fn view_mode(&self) -> ViewMode {
        self.params.view_mode
    }

    fn set_view_mode(&mut self, mode: ViewMode) {
        debug!(%mode, "view mode changed");
        self.params.view_mode = mode;
        self.drag = None;
    }
}

fn is_invertible(m: DMat3) -> bool {
    m.is_finite() && m.determinant() != 0.0 && m.inverse().is_finite()
}

/// True when there is visible content and all of it is images.
fn content_is_images(layer: &DrawLayer) -> bool {
    let mut visible = layer.store().visible().peekable();
    visible.peek().is_some()
        && visible.all(|(_, _, entry)| matches!(entry.renderable(), Renderable::Image(_)))
}

/// Scale pixel coordinates by `scale` about `center`, acting on `h = K * p`.
fn zoom_about(center: DVec2, scale: f64) -> DMat4 {
    DMat4::from_cols(
        DVec4::new(scale, 0.0, 0.0, 0.0),
        DVec4::new(0.0, scale, 0.0, 0.0),
        DVec4::new(0.0, 0.0, 1.0, 0.0),
        DVec4::new((1.0 - scale) * center.x, (1.0 - scale) * center.y, 0.0, 1.0),
    )
}
