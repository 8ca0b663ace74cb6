//! Scripted sessions: a layer, its handler, some content and a timeline of
//! input events, replayed without a window.

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use glam::{DMat3, DMat4, DVec2, DVec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};
use vantage_data::{DrawnImage, DrawnPoints, MinMax};
use vantage_window::{
    CameraPose, Context, DrawLayer, DrawLayerHandler, DrawLayerParams, Event,
    GroundPlaneDepthSampler, HandlerParams, LayerError, SharedHandler, SizeHint, ViewHandler,
    ViewMode, orthographic, pinhole,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session file error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Layer error: {0}")]
    Layer(#[from] LayerError),

    #[error("Camera cannot look from {center} along {forward} with up {up}")]
    Camera {
        center: DVec3,
        forward: DVec3,
        up: DVec3,
    },

    #[error("Frame rate must be positive and finite, got {0}")]
    FrameRate(f64),

    #[error("Timeline entry {index} has non-finite time {time}")]
    EventTime { index: usize, time: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum IntrinsicsConfig {
    Pinhole { fx: f64, fy: f64, cx: f64, cy: f64 },
    Orthographic { scale: f64, cx: f64, cy: f64 },
}

impl IntrinsicsConfig {
    fn matrix(&self) -> DMat4 {
        match *self {
            IntrinsicsConfig::Pinhole { fx, fy, cx, cy } => pinhole(fx, fy, cx, cy),
            IntrinsicsConfig::Orthographic { scale, cx, cy } => orthographic(scale, cx, cy),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub center: DVec3,
    pub look_at: DVec3,
    #[serde(default = "default_up")]
    pub up: DVec3,
}

fn default_up() -> DVec3 {
    DVec3::Z
}

impl CameraConfig {
    fn pose(&self) -> Result<CameraPose, SessionError> {
        let forward = self.look_at - self.center;
        CameraPose::looking(self.center, forward, self.up).ok_or(SessionError::Camera {
            center: self.center,
            forward,
            up: self.up,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    pub title: String,
    pub size_hint: SizeHint,
    /// Window the layer is shown in, in pixels. Image pixels coincide with
    /// window pixels.
    pub window_size: DVec2,
    pub camera: CameraConfig,
    pub intrinsics: IntrinsicsConfig,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            title: "session".to_owned(),
            size_hint: SizeHint::default(),
            window_size: DVec2::new(640.0, 480.0),
            camera: CameraConfig {
                center: DVec3::new(0.0, -10.0, 0.0),
                look_at: DVec3::ZERO,
                up: DVec3::Z,
            },
            intrinsics: IntrinsicsConfig::Pinhole {
                fx: 500.0,
                fy: 500.0,
                cx: 320.0,
                cy: 240.0,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    pub view_mode: ViewMode,
    pub up_in_world: DVec3,
    /// Absent means the camera is unbounded.
    pub camera_limits_in_world: Option<MinMax<DVec3>>,
    pub ground_offset: f64,
    pub search_radius: u32,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            view_mode: ViewMode::BestGuess,
            up_in_world: DVec3::Z,
            camera_limits_in_world: None,
            ground_offset: 0.0,
            search_radius: 2,
        }
    }
}

impl HandlerConfig {
    fn params(&self) -> HandlerParams {
        let sampler = GroundPlaneDepthSampler::new()
            .with_search_radius(self.search_radius)
            .with_ground_plane(self.up_in_world, self.ground_offset);
        HandlerParams::default()
            .with_depth_sampler(Rc::new(sampler))
            .with_up_in_world(self.up_in_world)
            .with_camera_limits_in_world(self.camera_limits_in_world.unwrap_or_default())
            .with_view_mode(self.view_mode)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentConfig {
    Points {
        group: String,
        #[serde(default)]
        object: usize,
        positions: Vec<DVec3>,
    },
    /// A blank image placed in the world.
    Image {
        group: String,
        #[serde(default)]
        object: usize,
        width: u32,
        height: u32,
        #[serde(default)]
        world_from_drawable: Option<DMat4>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TimelineAction {
    Input { event: Event },
    SetGroupEnabled {
        group: String,
        enabled: bool,
    },
    SetEnabled {
        group: String,
        #[serde(default)]
        object: usize,
        enabled: bool,
    },
    SetViewMode { mode: ViewMode },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedAction {
    /// Seconds since the start of the session.
    pub time: f64,
    #[serde(flatten)]
    pub action: TimelineAction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub layer: LayerConfig,
    pub handler: HandlerConfig,
    pub content: Vec<ContentConfig>,
    pub events: Vec<TimedAction>,
}

impl SessionConfig {
    pub fn from_json(text: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// What a replay ended with.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub events: usize,
    pub consumed: usize,
    pub frames: usize,
    pub cam_from_world: DMat4,
}

/// A layer wired to a view handler, driven from a timeline.
pub struct Session {
    layer: DrawLayer,
    handler: Rc<RefCell<ViewHandler>>,
    context: Context,
    events: Vec<TimedAction>,
}

impl Session {
    pub fn new(config: &SessionConfig) -> Result<Self, SessionError> {
        if let Some((index, timed)) = config
            .events
            .iter()
            .enumerate()
            .find(|(_, timed)| !timed.time.is_finite())
        {
            return Err(SessionError::EventTime {
                index,
                time: timed.time,
            });
        }
        let pose = config.layer.camera.pose()?;
        let handler = Rc::new(RefCell::new(ViewHandler::new(config.handler.params())));
        let shared: SharedHandler = handler.clone();
        let mut layer = DrawLayer::new(
            DrawLayerParams::default()
                .with_title(config.layer.title.clone())
                .with_size_hint(config.layer.size_hint)
                .with_handler(shared)
                .with_cam_from_world(pose.cam_from_world())
                .with_intrinsic_k(config.layer.intrinsics.matrix()),
        );

        for content in &config.content {
            match content {
                ContentConfig::Points {
                    group,
                    object,
                    positions,
                } => {
                    let points = layer.get_t::<DrawnPoints>(group, *object)?;
                    points.positions.extend_from_slice(positions);
                }
                ContentConfig::Image {
                    group,
                    object,
                    width,
                    height,
                    world_from_drawable,
                } => {
                    let image = layer.get_t::<DrawnImage>(group, *object)?;
                    image.image = image::RgbaImage::new(*width, *height);
                    if let Some(world_from_drawable) = world_from_drawable {
                        image.world_from_drawable = *world_from_drawable;
                    }
                }
            }
        }

        let mut events = config.events.clone();
        events.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(Self {
            layer,
            handler,
            context: Context::new(config.layer.window_size),
            events,
        })
    }

    pub fn layer(&self) -> &DrawLayer {
        &self.layer
    }

    pub fn view_mode(&self) -> ViewMode {
        self.handler.borrow().view_mode()
    }

    /// Window pixels to clip space, y up.
    fn clip_from_window(&self) -> DMat3 {
        let size = self.context.window_size;
        DMat3::from_cols(
            DVec3::new(2.0 / size.x, 0.0, 0.0),
            DVec3::new(0.0, -2.0 / size.y, 0.0),
            DVec3::new(-1.0, 1.0, 1.0),
        )
    }

    fn clip_aspect_scale(&self) -> DVec2 {
        let size = self.context.window_size;
        if size.x >= size.y {
            DVec2::new(size.x / size.y, 1.0)
        } else {
            DVec2::new(1.0, size.y / size.x)
        }
    }

    fn apply(&mut self, action: &TimelineAction) -> bool {
        match action {
            TimelineAction::Input { event } => self.dispatch(event),
            TimelineAction::SetGroupEnabled { group, enabled } => {
                self.layer.set_group_enabled(group, *enabled);
                true
            }
            TimelineAction::SetEnabled {
                group,
                object,
                enabled,
            } => self.layer.set_enabled(group, *object, *enabled),
            TimelineAction::SetViewMode { mode } => {
                self.handler.borrow_mut().set_view_mode(*mode);
                true
            }
        }
    }

    fn dispatch(&mut self, event: &Event) -> bool {
        let render_state = self.layer.render_state(None);
        let context = Context {
            modifiers: event.modifiers,
            ..self.context
        };
        let clip_from_window = self.clip_from_window();
        let clip_aspect_scale = self.clip_aspect_scale();
        self.layer.handle_event(
            &context,
            event,
            clip_from_window,
            DMat3::IDENTITY,
            clip_aspect_scale,
            &render_state,
        )
    }

    /// Step the clock at `frame_rate` frames per second, applying each
    /// timeline entry on the first frame at or after its time, until the
    /// timeline is exhausted and animations have settled.
    #[instrument(skip(self), fields(title = %self.layer.title()))]
    pub fn replay(&mut self, frame_rate: f64) -> Result<ReplayReport, SessionError> {
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(SessionError::FrameRate(frame_rate));
        }
        let dt = 1.0 / frame_rate;
        let events = std::mem::take(&mut self.events);
        let mut report = ReplayReport {
            events: events.len(),
            consumed: 0,
            frames: 0,
            cam_from_world: self.layer.cam_from_world(),
        };

        let mut pending = events.iter().peekable();
        let mut last_center = CameraPose::new(self.layer.cam_from_world()).center();
        loop {
            let now = report.frames as f64 * dt;
            self.layer.advance_to(now);
            while let Some(timed) = pending.next_if(|timed| timed.time <= now) {
                let consumed = self.apply(&timed.action);
                debug!(time = timed.time, consumed, action = ?timed.action, "timeline action");
                if consumed {
                    report.consumed += 1;
                }
            }

            let center = CameraPose::new(self.layer.cam_from_world()).center();
            if center != last_center {
                info!(frame = report.frames, now, ?center, "camera moved");
                last_center = center;
            }
            report.frames += 1;
            if pending.peek().is_none() && !self.layer.is_animating() {
                break;
            }
        }

        report.cam_from_world = self.layer.cam_from_world();
        let bounds = self.layer.scene_bounds_in_world();
        info!(
            frames = report.frames,
            consumed = report.consumed,
            center = ?last_center,
            bounds_min = ?bounds.min(),
            bounds_max = ?bounds.max(),
            "replay finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_window::{EventKind, PointerButton};

    const SESSION: &str = r#"{
        "layer": {
            "title": "test",
            "window_size": [100.0, 100.0],
            "camera": { "center": [0.0, -10.0, 0.0], "look_at": [0.0, 0.0, 0.0] },
            "intrinsics": {
                "model": "pinhole", "fx": 100.0, "fy": 100.0, "cx": 50.0, "cy": 50.0
            }
        },
        "handler": { "view_mode": "freeview" },
        "content": [
            {
                "kind": "points",
                "group": "scene",
                "positions": [[-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]]
            }
        ],
        "events": [
            {
                "time": 0.5,
                "action": "input",
                "event": { "position": [50.0, 50.0], "type": "scroll", "delta": [0.0, 2.0] }
            },
            { "time": 0.0, "action": "set_group_enabled", "group": "hidden", "enabled": false }
        ]
    }"#;

    #[test]
    fn test_parse_session() {
        let config = SessionConfig::from_json(SESSION).unwrap();
        assert_eq!(config.layer.title, "test");
        assert_eq!(config.handler.view_mode, ViewMode::Freeview);
        assert_eq!(config.handler.camera_limits_in_world, None);
        assert_eq!(config.events.len(), 2);
        match &config.events[0].action {
            TimelineAction::Input { event } => {
                assert_eq!(event.kind, EventKind::Scroll { delta: DVec2::new(0.0, 2.0) });
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = SessionConfig::from_json("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert!(Session::new(&config).is_ok());
    }

    #[test]
    fn test_bad_json_is_reported() {
        let err = SessionConfig::from_json("{ \"layer\": 3 }").unwrap_err();
        assert!(matches!(err, SessionError::Json(_)));
    }

    #[test]
    fn test_degenerate_camera_is_reported() {
        let mut config = SessionConfig::default();
        config.layer.camera.look_at = config.layer.camera.center;
        assert!(matches!(Session::new(&config), Err(SessionError::Camera { .. })));
    }

    #[test]
    fn test_replay_applies_events_in_time_order() {
        let config = SessionConfig::from_json(SESSION).unwrap();
        let mut session = Session::new(&config).unwrap();
        let report = session.replay(10.0).unwrap();
        assert_eq!(report.events, 2);
        assert_eq!(report.consumed, 2);
        assert!(!session.layer().is_group_enabled("hidden"));

        let center = CameraPose::new(report.cam_from_world).center();
        assert!((center - DVec3::new(0.0, -8.1, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_replay_waits_for_animations() {
        let mut config = SessionConfig::from_json(SESSION).unwrap();
        config.events = vec![TimedAction {
            time: 0.0,
            action: TimelineAction::Input {
                event: Event::new(
                    DVec2::new(75.0, 50.0),
                    EventKind::DoubleClick {
                        button: PointerButton::Primary,
                    },
                ),
            },
        }];
        let mut session = Session::new(&config).unwrap();
        let report = session.replay(100.0).unwrap();
        assert!(report.frames >= 30);
        assert!(!session.layer().is_animating());
    }

    #[test]
    fn test_rejects_bad_frame_rate() {
        let mut session = Session::new(&SessionConfig::default()).unwrap();
        assert!(matches!(session.replay(0.0), Err(SessionError::FrameRate(_))));
    }

    #[test]
    fn test_rejects_non_finite_event_time() {
        let mut config = SessionConfig::from_json(SESSION).unwrap();
        config.events.push(TimedAction {
            time: f64::NAN,
            action: TimelineAction::SetViewMode {
                mode: ViewMode::ImagePlane,
            },
        });
        assert!(matches!(
            Session::new(&config),
            Err(SessionError::EventTime { index: 2, .. })
        ));
    }

    #[test]
    fn test_set_enabled_action_hides_entry() {
        let mut config = SessionConfig::from_json(SESSION).unwrap();
        config.content.push(ContentConfig::Points {
            group: "scene".to_owned(),
            object: 1,
            positions: vec![DVec3::splat(50.0)],
        });
        config.events = serde_json::from_str(
            r#"[
                {
                    "time": 0.0, "action": "set_enabled",
                    "group": "scene", "object": 1, "enabled": false
                },
                { "time": 0.0, "action": "set_enabled", "group": "missing", "enabled": false }
            ]"#,
        )
        .unwrap();
        let mut session = Session::new(&config).unwrap();
        let report = session.replay(10.0).unwrap();
        assert_eq!(report.consumed, 1);
        assert!(!session.layer().is_enabled("scene", 1));
        assert_eq!(session.layer().scene_bounds_in_world().max(), DVec3::ONE);
    }

    #[test]
    fn test_view_mode_action() {
        let mut config = SessionConfig::default();
        config.events.push(TimedAction {
            time: 0.0,
            action: TimelineAction::SetViewMode {
                mode: ViewMode::ImagePlane,
            },
        });
        let mut session = Session::new(&config).unwrap();
        session.replay(30.0).unwrap();
        assert_eq!(session.view_mode(), ViewMode::ImagePlane);
    }
}
