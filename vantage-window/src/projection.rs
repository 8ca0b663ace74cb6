//! How camera-frame points map to pixels and back.
//!
//! A projection is a 4x4 intrinsic matrix `K` with `h = K * (x, y, z, 1)`
//! and pixel `(h.x / h.w, h.y / h.w)`. [`pinhole`] places `z` in `h.w`; the
//! identity is orthographic. Optionally a measured lookup table replaces the
//! closed form for lenses it cannot describe (fisheye and the like).

use std::f64::consts::PI;
use std::fmt;

use glam::{DMat4, DVec2, DVec3, DVec4};
use vantage_data::finite_min_max_iter;
use vantage_gpu::{DeviceBuffer, Shared};

use crate::animation::Interpolate;
use crate::errors::LayerError;

/// Rays within this angle of the optical axis count as parallel.
const ORTHOGRAPHIC_RAY_SPREAD: f64 = 1.0 * PI / 180.0;
const ORTHOGRAPHIC_W_TOLERANCE: f64 = 1e-3;

/// Intrinsics of a pinhole camera with focal lengths and principal point in
/// pixels.
pub fn pinhole(fx: f64, fy: f64, cx: f64, cy: f64) -> DMat4 {
    DMat4::from_cols(
        DVec4::new(fx, 0.0, 0.0, 0.0),
        DVec4::new(0.0, fy, 0.0, 0.0),
        DVec4::new(cx, cy, 0.0, 1.0),
        DVec4::new(0.0, 0.0, 1.0, 0.0),
    )
}

/// Orthographic intrinsics: `scale` pixels per world unit, `(cx, cy)` is the
/// pixel the optical axis passes through.
pub fn orthographic(scale: f64, cx: f64, cy: f64) -> DMat4 {
    DMat4::from_cols(
        DVec4::new(scale, 0.0, 0.0, 0.0),
        DVec4::new(0.0, scale, 0.0, 0.0),
        DVec4::new(0.0, 0.0, 1.0, 0.0),
        DVec4::new(cx, cy, 0.0, 1.0),
    )
}

/// Which buffer of a lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LutRole {
    Unproject,
    Project,
    Vignette,
}

impl LutRole {
    pub fn channels(self) -> u32 {
        match self {
            LutRole::Unproject => 3,
            LutRole::Project => 2,
            LutRole::Vignette => 1,
        }
    }
}

impl fmt::Display for LutRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LutRole::Unproject => write!(f, "unproject"),
            LutRole::Project => write!(f, "project"),
            LutRole::Vignette => write!(f, "vignette"),
        }
    }
}

/// Measured projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Lut {
    /// Pixel `(u, v)` to camera-frame ray direction `(dx, dy, dz)`.
    unproject: Shared<DeviceBuffer>,
    /// Ray angle `(phi, theta)` to pixel `(u, v)`. Columns span
    /// `phi ∈ [-π, π]`, rows span `theta ∈ [0, π]` measured from +z. The
    /// angular domain stays bounded for any lens, fisheye included.
    project: Shared<DeviceBuffer>,
    /// Per-pixel intensity scale.
    vignette: Shared<DeviceBuffer>,
}

impl Lut {
    pub fn new(
        unproject: Shared<DeviceBuffer>,
        project: Shared<DeviceBuffer>,
        vignette: Shared<DeviceBuffer>,
    ) -> Result<Self, LayerError> {
        for (role, buffer) in [
            (LutRole::Unproject, &unproject),
            (LutRole::Project, &project),
            (LutRole::Vignette, &vignette),
        ] {
            if buffer.channels() != role.channels() {
                return Err(LayerError::LutChannels {
                    role,
                    expected: role.channels(),
                    actual: buffer.channels(),
                });
            }
        }
        Ok(Self {
            unproject,
            project,
            vignette,
        })
    }

    pub fn buffer(&self, role: LutRole) -> &Shared<DeviceBuffer> {
        match role {
            LutRole::Unproject => &self.unproject,
            LutRole::Project => &self.project,
            LutRole::Vignette => &self.vignette,
        }
    }

    fn unproject(&self, pixel: DVec2) -> Option<Ray> {
        let table = &self.unproject;
        let (w, h) = (f64::from(table.width()), f64::from(table.height()));
        if pixel.x < -0.5 || pixel.y < -0.5 || pixel.x > w - 0.5 || pixel.y > h - 0.5 {
            return None;
        }
        let [dx, dy, dz] = table.sample_bilinear::<3>(pixel.x, pixel.y)?;
        let direction = DVec3::new(f64::from(dx), f64::from(dy), f64::from(dz)).normalize_or_zero();
        if direction == DVec3::ZERO || !direction.is_finite() {
            return None;
        }
        Some(Ray {
            origin: DVec3::ZERO,
            direction,
        })
    }

    fn project(&self, point: DVec3) -> Option<DVec2> {
        let length = point.length();
        if length <= f64::EPSILON {
            return None;
        }
        let theta = (point.z / length).clamp(-1.0, 1.0).acos();
        let phi = point.y.atan2(point.x);
        let table = &self.project;
        if table.width() == 0 || table.height() == 0 {
            return None;
        }
        let col = (phi + PI) / (2.0 * PI) * f64::from(table.width() - 1);
        let row = theta / PI * f64::from(table.height() - 1);
        let [u, v] = table.sample_bilinear::<2>(col, row)?;
        let pixel = DVec2::new(f64::from(u), f64::from(v));
        pixel.is_finite().then_some(pixel)
    }

    fn vignette(&self, pixel: DVec2) -> f64 {
        self.vignette
            .sample_bilinear::<1>(pixel.x, pixel.y)
            .map(|[scale]| f64::from(scale))
            .filter(|scale| scale.is_finite())
            .unwrap_or(1.0)
    }

    /// True when every ray lies within [`ORTHOGRAPHIC_RAY_SPREAD`] of +z.
    fn rays_are_parallel(&self) -> bool {
        let Ok(rays) = self.unproject.texels::<[f32; 3]>() else {
            return false;
        };
        let cos_along_axis = finite_min_max_iter(rays.iter().map(|&[x, y, z]| {
            DVec3::new(f64::from(x), f64::from(y), f64::from(z))
                .normalize_or_zero()
                .z
        }));
        !cos_along_axis.is_empty() && cos_along_axis.min() >= ORTHOGRAPHIC_RAY_SPREAD.cos()
    }
}

/// A lookup table under construction. Every role must be filled before it
/// can become a [`Lut`].
#[derive(Debug, Clone, Default)]
pub struct LutDescriptor {
    pub unproject: Option<Shared<DeviceBuffer>>,
    pub project: Option<Shared<DeviceBuffer>>,
    pub vignette: Option<Shared<DeviceBuffer>>,
}

impl LutDescriptor {
    pub fn with_unproject(mut self, buffer: DeviceBuffer) -> Self {
        self.unproject = Some(Shared::new(buffer));
        self
    }

    pub fn with_project(mut self, buffer: DeviceBuffer) -> Self {
        self.project = Some(Shared::new(buffer));
        self
    }

    pub fn with_vignette(mut self, buffer: DeviceBuffer) -> Self {
        self.vignette = Some(Shared::new(buffer));
        self
    }

    pub fn build(self) -> Result<Lut, LayerError> {
        let unproject = self
            .unproject
            .ok_or(LayerError::MissingLutBuffer(LutRole::Unproject))?;
        let project = self
            .project
            .ok_or(LayerError::MissingLutBuffer(LutRole::Project))?;
        let vignette = self
            .vignette
            .ok_or(LayerError::MissingLutBuffer(LutRole::Vignette))?;
        Lut::new(unproject, project, vignette)
    }
}

/// Correction applied on top of the intrinsic matrix.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum NonLinearMethod {
    /// The intrinsic matrix alone describes the camera.
    #[default]
    Linear,
    Lut(Lut),
}

/// A line of sight in the camera frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    /// Unit length, pointing forward (`z >= 0` for linear models).
    pub direction: DVec3,
}

impl Ray {
    /// Point on the ray whose camera-frame `z` equals `depth`.
    pub fn point_at_depth(&self, depth: f64) -> Option<DVec3> {
        if self.direction.z.abs() <= f64::EPSILON {
            return None;
        }
        let t = (depth - self.origin.z) / self.direction.z;
        let point = self.origin + self.direction * t;
        point.is_finite().then_some(point)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionModel {
    pub intrinsic_k: DMat4,
    pub non_linear: NonLinearMethod,
}

impl ProjectionModel {
    pub fn new(intrinsic_k: DMat4, non_linear: NonLinearMethod) -> Self {
        Self {
            intrinsic_k,
            non_linear,
        }
    }

    pub fn linear(intrinsic_k: DMat4) -> Self {
        Self::new(intrinsic_k, NonLinearMethod::Linear)
    }

    pub fn lut(&self) -> Option<&Lut> {
        match &self.non_linear {
            NonLinearMethod::Lut(lut) => Some(lut),
            NonLinearMethod::Linear => None,
        }
    }

    /// Ray through `pixel`, or `None` if the model cannot invert it.
    pub fn unproject(&self, pixel: DVec2) -> Option<Ray> {
        match &self.non_linear {
            NonLinearMethod::Lut(lut) => lut.unproject(pixel),
            NonLinearMethod::Linear => self.unproject_linear(pixel),
        }
    }

    /// Pixel of a camera-frame point, or `None` if it does not project.
    pub fn project(&self, point: DVec3) -> Option<DVec2> {
        match &self.non_linear {
            NonLinearMethod::Lut(lut) => lut.project(point),
            NonLinearMethod::Linear => {
                let h = self.intrinsic_k * point.extend(1.0);
                if h.w.abs() <= f64::EPSILON {
                    return None;
                }
                let pixel = DVec2::new(h.x / h.w, h.y / h.w);
                pixel.is_finite().then_some(pixel)
            }
        }
    }

    pub fn vignette(&self, pixel: DVec2) -> f64 {
        match &self.non_linear {
            NonLinearMethod::Lut(lut) => lut.vignette(pixel),
            NonLinearMethod::Linear => 1.0,
        }
    }

    /// Whether the view is close enough to orthographic to be navigated as a
    /// flat image.
    pub fn is_near_orthographic(&self) -> bool {
        match &self.non_linear {
            NonLinearMethod::Lut(lut) => lut.rays_are_parallel(),
            NonLinearMethod::Linear => {
                let w_row = self.intrinsic_k.row(3);
                w_row.w.abs() > f64::EPSILON
                    && w_row.truncate().length() <= ORTHOGRAPHIC_W_TOLERANCE * w_row.w.abs()
            }
        }
    }

    fn unproject_linear(&self, pixel: DVec2) -> Option<Ray> {
        if self.intrinsic_k.determinant().abs() <= f64::EPSILON {
            return None;
        }
        let k_inv = self.intrinsic_k.inverse();
        // Two points on the line of sight, at different depth encodings.
        let a = dehomogenize(k_inv * DVec4::new(pixel.x, pixel.y, 1.0, 1.0))?;
        let b = dehomogenize(k_inv * DVec4::new(pixel.x, pixel.y, 0.5, 1.0))?;
        let mut direction = (b - a).normalize_or_zero();
        if direction.z < 0.0 {
            direction = -direction;
        }
        if direction.z <= f64::EPSILON {
            return None;
        }
        let origin = a - direction * (a.z / direction.z);
        Some(Ray { origin, direction })
    }
}

impl Default for ProjectionModel {
    fn default() -> Self {
        Self::linear(DMat4::IDENTITY)
    }
}

impl Interpolate for ProjectionModel {
    /// Intrinsics blend element-wise; a lookup table switches at the midpoint.
    fn interpolate(&self, to: &Self, alpha: f64) -> Self {
        let intrinsic_k = self.intrinsic_k + (to.intrinsic_k - self.intrinsic_k) * alpha;
        let non_linear = if alpha < 0.5 {
            self.non_linear.clone()
        } else {
            to.non_linear.clone()
        };
        Self::new(intrinsic_k, non_linear)
    }
}

fn dehomogenize(h: DVec4) -> Option<DVec3> {
    if h.w.abs() <= f64::EPSILON {
        return None;
    }
    let p = h.truncate() / h.w;
    p.is_finite().then_some(p)
}
