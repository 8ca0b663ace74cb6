pub mod animation;
pub mod camera;
pub mod depth_sampler;
mod draw_layer;
mod errors;
pub mod handler;
pub mod input;
pub mod projection;
mod render_state;
pub mod store;

pub use animation::{Animated, Interpolate};
pub use camera::CameraPose;
pub use depth_sampler::{DepthSampler, GroundPlaneDepthSampler};
pub use draw_layer::{Dimension, DrawLayer, DrawLayerParams, SharedHandler, SizeHint};
pub use errors::LayerError;
pub use handler::{DrawLayerHandler, HandlerParams, ViewHandler, ViewMode};
pub use input::{Context, Event, EventKind, EventTranslator, Key, Modifiers, PointerButton};
pub use projection::{
    Lut, LutDescriptor, LutRole, NonLinearMethod, ProjectionModel, Ray, orthographic, pinhole,
};
pub use render_state::{DepthImage, DrawLayerRenderState};
pub use store::{Entry, RenderableStore};
