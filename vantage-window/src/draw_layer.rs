//! A viewport's scene content, camera and projection.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{DMat3, DMat4, DVec2, DVec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vantage_data::{MinMax, Renderable, RenderableKind};

use crate::animation::Animated;
use crate::camera::CameraPose;
use crate::errors::LayerError;
use crate::handler::DrawLayerHandler;
use crate::input::{Context, Event};
use crate::projection::{LutDescriptor, NonLinearMethod, ProjectionModel};
use crate::render_state::{DepthImage, DrawLayerRenderState};
use crate::store::RenderableStore;

/// A handler can be attached to several layers; only one drives input at a
/// time.
pub type SharedHandler = Rc<RefCell<dyn DrawLayerHandler>>;

/// One axis of a layer's requested size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Relative share of the space left after fixed-size layers.
    Parts(u32),
    Pixels(u32),
}

impl Default for Dimension {
    fn default() -> Self {
        Dimension::Parts(1)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeHint {
    pub width: Dimension,
    pub height: Dimension,
}

/// Construction parameters for a [`DrawLayer`].
#[derive(Clone)]
pub struct DrawLayerParams {
    pub title: String,
    pub size_hint: SizeHint,
    pub handler: Option<SharedHandler>,
    pub cam_from_world: DMat4,
    pub intrinsic_k: DMat4,
    pub non_linear: NonLinearMethod,
}

impl Default for DrawLayerParams {
    fn default() -> Self {
        Self {
            title: "Draw layer".to_owned(),
            size_hint: SizeHint::default(),
            handler: None,
            cam_from_world: DMat4::IDENTITY,
            intrinsic_k: DMat4::IDENTITY,
            non_linear: NonLinearMethod::Linear,
        }
    }
}

impl DrawLayerParams {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_size_hint(mut self, size_hint: SizeHint) -> Self {
        self.size_hint = size_hint;
        self
    }

    pub fn with_handler(mut self, handler: SharedHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn with_cam_from_world(mut self, cam_from_world: DMat4) -> Self {
        self.cam_from_world = cam_from_world;
        self
    }

    pub fn with_intrinsic_k(mut self, intrinsic_k: DMat4) -> Self {
        self.intrinsic_k = intrinsic_k;
        self
    }

    pub fn with_non_linear(mut self, non_linear: NonLinearMethod) -> Self {
        self.non_linear = non_linear;
        self
    }
}

/// Owns renderable content plus the camera pose and projection it is viewed
/// through. Pose and projection changes may be animated; the layer does not
/// own a clock, the caller moves it forward with [`advance_to`](Self::advance_to).
pub struct DrawLayer {
    title: String,
    size_hint: SizeHint,
    projection: Animated<ProjectionModel>,
    pose: Animated<CameraPose>,
    store: RenderableStore,
    handler: Option<SharedHandler>,
    now: f64,
}

impl DrawLayer {
    pub fn new(params: DrawLayerParams) -> Self {
        debug!(title = %params.title, "draw layer created");
        Self {
            title: params.title,
            size_hint: params.size_hint,
            projection: Animated::new(ProjectionModel::new(params.intrinsic_k, params.non_linear)),
            pose: Animated::new(CameraPose::new(params.cam_from_world)),
            store: RenderableStore::new(),
            handler: params.handler,
            now: 0.0,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn size_hint(&self) -> SizeHint {
        self.size_hint
    }

    /// Move the layer clock to `now` seconds. Earlier times are ignored.
    pub fn advance_to(&mut self, now: f64) {
        if now.is_finite() && now > self.now {
            self.now = now;
        }
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    /// Replace the projection, blending over `duration_seconds`. Replaces
    /// any projection transition still in flight.
    pub fn set_projection(&mut self, projection: ProjectionModel, duration_seconds: f64) {
        debug!(
            lut = projection.lut().is_some(),
            duration_seconds, "projection set"
        );
        self.projection.retarget(projection, self.now, duration_seconds);
    }

    /// Replace the projection with a lookup table model. A descriptor
    /// missing a role is rejected and the current projection is kept.
    pub fn set_projection_lut(
        &mut self,
        intrinsic_k: DMat4,
        lut: LutDescriptor,
        duration_seconds: f64,
    ) -> Result<(), LayerError> {
        let lut = lut.build()?;
        self.set_projection(
            ProjectionModel::new(intrinsic_k, NonLinearMethod::Lut(lut)),
            duration_seconds,
        );
        Ok(())
    }

    /// Move the camera, blending over `duration_seconds`. Replaces any pose
    /// transition still in flight.
    pub fn set_cam_from_world(&mut self, cam_from_world: DMat4, duration_seconds: f64) {
        self.pose
            .retarget(CameraPose::new(cam_from_world), self.now, duration_seconds);
    }

    pub fn set_handler(&mut self, handler: Option<SharedHandler>) {
        self.handler = handler;
    }

    pub fn handler(&self) -> Option<&SharedHandler> {
        self.handler.as_ref()
    }

    /// Pose at the layer clock.
    pub fn cam_from_world(&self) -> DMat4 {
        self.cam_from_world_at(self.now)
    }

    pub fn cam_from_world_at(&self, time: f64) -> DMat4 {
        self.pose.sample(time).cam_from_world()
    }

    /// Pose the current transition ends at.
    pub fn target_cam_from_world(&self) -> DMat4 {
        self.pose.target().cam_from_world()
    }

    /// Projection at the layer clock.
    pub fn projection(&self) -> ProjectionModel {
        self.projection_at(self.now)
    }

    pub fn projection_at(&self, time: f64) -> ProjectionModel {
        self.projection.sample(time)
    }

    pub fn target_projection(&self) -> &ProjectionModel {
        self.projection.target()
    }

    pub fn is_animating(&self) -> bool {
        self.pose.is_animating(self.now) || self.projection.is_animating(self.now)
    }

    /// World-frame extent of everything in enabled groups.
    pub fn scene_bounds_in_world(&self) -> MinMax<DVec3> {
        self.store
            .visible()
            .map(|(_, _, entry)| entry.renderable().bounds_in_world())
            .fold(MinMax::default(), |mut bounds, entry_bounds| {
                bounds.merge(&entry_bounds);
                bounds
            })
    }

    pub fn get(&mut self, group_key: &str, object_key: usize) -> &mut Renderable {
        self.store.get(group_key, object_key)
    }

    pub fn get_t<K: RenderableKind>(
        &mut self,
        group_key: &str,
        object_key: usize,
    ) -> Result<&mut K, LayerError> {
        self.store.get_t(group_key, object_key)
    }

    pub fn erase(&mut self, group_key: &str, object_key: usize) -> bool {
        self.store.erase(group_key, object_key)
    }

    pub fn set_group_enabled(&mut self, group_key: &str, enabled: bool) {
        self.store.set_group_enabled(group_key, enabled);
    }

    pub fn is_group_enabled(&self, group_key: &str) -> bool {
        self.store.is_group_enabled(group_key)
    }

    /// Hide or show one entry without touching its group's flag.
    pub fn set_enabled(&mut self, group_key: &str, object_key: usize, enabled: bool) -> bool {
        self.store.set_enabled(group_key, object_key, enabled)
    }

    pub fn is_enabled(&self, group_key: &str, object_key: usize) -> bool {
        self.store.is_enabled(group_key, object_key)
    }

    pub fn store(&self) -> &RenderableStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut RenderableStore {
        &mut self.store
    }

    /// Forward an input event to the attached handler. Returns whether it
    /// was consumed; false without a handler or when the handler is already
    /// busy with another event.
    pub fn handle_event(
        &mut self,
        context: &Context,
        event: &Event,
        clip_from_window: DMat3,
        pixel_from_window: DMat3,
        clip_aspect_scale: DVec2,
        render_state: &DrawLayerRenderState,
    ) -> bool {
        let Some(shared) = self.handler.clone() else {
            return false;
        };
        let Ok(mut handler) = shared.try_borrow_mut() else {
            warn!(title = %self.title, "handler is already handling an event");
            return false;
        };
        handler.handle_event(
            context,
            event,
            clip_from_window,
            pixel_from_window,
            clip_aspect_scale,
            self,
            render_state,
        )
    }

    /// Snapshot of what a renderer would draw at the layer clock.
    pub fn render_state(&self, depth: Option<DepthImage>) -> DrawLayerRenderState {
        DrawLayerRenderState {
            cam_from_world: self.cam_from_world(),
            projection: self.projection(),
            depth,
        }
    }
}
