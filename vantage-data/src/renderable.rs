//! Drawable content managed by a draw layer.
//!
//! The set of kinds is closed: [`Renderable`] is a tagged union over
//! [`DrawnPoints`], [`DrawnMesh`] and [`DrawnImage`]. Every kind carries a
//! `world_from_drawable` transform and reports its bounds in the world frame.

use glam::{DMat4, DVec3, Vec3};
use image::RgbaImage;

use crate::min_max::{MinMax, finite_min_max_iter};

/// A colored point set.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnPoints {
    pub world_from_drawable: DMat4,
    /// Positions in the drawable frame.
    pub positions: Vec<DVec3>,
    /// RGB color per point (linear, 0-1 range). May be empty.
    pub colors: Vec<Vec3>,
    pub point_size: f32,
}

impl DrawnPoints {
    pub fn new(positions: Vec<DVec3>) -> Self {
        Self {
            positions,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl Default for DrawnPoints {
    fn default() -> Self {
        Self {
            world_from_drawable: DMat4::IDENTITY,
            positions: Vec::new(),
            colors: Vec::new(),
            point_size: 1.0,
        }
    }
}

/// An indexed triangle mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnMesh {
    pub world_from_drawable: DMat4,
    pub vertices: Vec<DVec3>,
    pub triangles: Vec<[u32; 3]>,
    pub colors: Vec<Vec3>,
}

impl DrawnMesh {
    pub fn new(vertices: Vec<DVec3>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            triangles,
            ..Self::default()
        }
    }

    /// Vertices referenced by at least one triangle.
    fn referenced_vertices(&self) -> impl Iterator<Item = DVec3> + '_ {
        self.triangles
            .iter()
            .flatten()
            .filter_map(|&i| self.vertices.get(i as usize).copied())
    }
}

impl Default for DrawnMesh {
    fn default() -> Self {
        Self {
            world_from_drawable: DMat4::IDENTITY,
            vertices: Vec::new(),
            triangles: Vec::new(),
            colors: Vec::new(),
        }
    }
}

/// An image drawn on the `z = 0` plane of its drawable frame, one unit per
/// pixel, with pixel centers at integer coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnImage {
    pub world_from_drawable: DMat4,
    pub image: RgbaImage,
}

impl DrawnImage {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            world_from_drawable: DMat4::IDENTITY,
            image,
        }
    }
}

impl Default for DrawnImage {
    fn default() -> Self {
        Self::new(RgbaImage::new(0, 0))
    }
}

/// Polymorphic drawable content.
#[derive(Debug, Clone, PartialEq)]
pub enum Renderable {
    Points(DrawnPoints),
    Mesh(DrawnMesh),
    Image(DrawnImage),
}

impl Default for Renderable {
    fn default() -> Self {
        Renderable::Points(DrawnPoints::default())
    }
}

impl Renderable {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Renderable::Points(_) => DrawnPoints::NAME,
            Renderable::Mesh(_) => DrawnMesh::NAME,
            Renderable::Image(_) => DrawnImage::NAME,
        }
    }

    pub fn world_from_drawable(&self) -> DMat4 {
        match self {
            Renderable::Points(p) => p.world_from_drawable,
            Renderable::Mesh(m) => m.world_from_drawable,
            Renderable::Image(i) => i.world_from_drawable,
        }
    }

    pub fn set_world_from_drawable(&mut self, world_from_drawable: DMat4) {
        match self {
            Renderable::Points(p) => p.world_from_drawable = world_from_drawable,
            Renderable::Mesh(m) => m.world_from_drawable = world_from_drawable,
            Renderable::Image(i) => i.world_from_drawable = world_from_drawable,
        }
    }

    /// Bounds in the drawable's own frame. Non-finite positions are skipped.
    pub fn bounds_in_drawable(&self) -> MinMax<DVec3> {
        match self {
            Renderable::Points(p) => finite_min_max_iter(p.positions.iter().copied()),
            Renderable::Mesh(m) => finite_min_max_iter(m.referenced_vertices()),
            Renderable::Image(i) => {
                let (width, height) = i.image.dimensions();
                if width == 0 || height == 0 {
                    return MinMax::default();
                }
                MinMax::new(
                    DVec3::new(-0.5, -0.5, 0.0),
                    DVec3::new(f64::from(width) - 0.5, f64::from(height) - 0.5, 0.0),
                )
            }
        }
    }

    /// Axis aligned bounds of this drawable in the world frame.
    pub fn bounds_in_world(&self) -> MinMax<DVec3> {
        let local = self.bounds_in_drawable();
        if local.is_empty() {
            return local;
        }
        let world_from_drawable = self.world_from_drawable();
        let (lo, hi) = (local.min(), local.max());
        (0..8)
            .map(|corner| {
                DVec3::new(
                    if corner & 1 == 0 { lo.x } else { hi.x },
                    if corner & 2 == 0 { lo.y } else { hi.y },
                    if corner & 4 == 0 { lo.z } else { hi.z },
                )
            })
            .map(|p| world_from_drawable.transform_point3(p))
            .collect()
    }
}

/// A concrete kind of [`Renderable`], used for typed access.
pub trait RenderableKind: Default + Into<Renderable> + 'static {
    const NAME: &'static str;

    fn from_renderable(renderable: &Renderable) -> Option<&Self>;
    fn from_renderable_mut(renderable: &mut Renderable) -> Option<&mut Self>;
}

impl RenderableKind for DrawnPoints {
    const NAME: &'static str = "points";

    fn from_renderable(renderable: &Renderable) -> Option<&Self> {
        match renderable {
            Renderable::Points(p) => Some(p),
            _ => None,
        }
    }

    fn from_renderable_mut(renderable: &mut Renderable) -> Option<&mut Self> {
        match renderable {
            Renderable::Points(p) => Some(p),
            _ => None,
        }
    }
}

impl RenderableKind for DrawnMesh {
    const NAME: &'static str = "mesh";

    fn from_renderable(renderable: &Renderable) -> Option<&Self> {
        match renderable {
            Renderable::Mesh(m) => Some(m),
            _ => None,
        }
    }

    fn from_renderable_mut(renderable: &mut Renderable) -> Option<&mut Self> {
        match renderable {
            Renderable::Mesh(m) => Some(m),
            _ => None,
        }
    }
}

impl RenderableKind for DrawnImage {
    const NAME: &'static str = "image";

    fn from_renderable(renderable: &Renderable) -> Option<&Self> {
        match renderable {
            Renderable::Image(i) => Some(i),
            _ => None,
        }
    }

    fn from_renderable_mut(renderable: &mut Renderable) -> Option<&mut Self> {
        match renderable {
            Renderable::Image(i) => Some(i),
            _ => None,
        }
    }
}

impl From<DrawnPoints> for Renderable {
    fn from(points: DrawnPoints) -> Self {
        Renderable::Points(points)
    }
}

impl From<DrawnMesh> for Renderable {
    fn from(mesh: DrawnMesh) -> Self {
        Renderable::Mesh(mesh)
    }
}

impl From<DrawnImage> for Renderable {
    fn from(image: DrawnImage) -> Self {
        Renderable::Image(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty_points() {
        let r = Renderable::default();
        assert_eq!(r.kind_name(), "points");
        assert!(r.bounds_in_world().is_empty());
    }

    #[test]
    fn test_points_bounds_in_world() {
        let mut points =
            DrawnPoints::new(vec![DVec3::new(0.0, 0.0, 0.0), DVec3::new(1.0, 2.0, 3.0)]);
        points.world_from_drawable = DMat4::from_translation(DVec3::new(10.0, 0.0, 0.0));
        let bounds = Renderable::from(points).bounds_in_world();
        assert_eq!(bounds.min(), DVec3::new(10.0, 0.0, 0.0));
        assert_eq!(bounds.max(), DVec3::new(11.0, 2.0, 3.0));
    }

    #[test]
    fn test_bounds_skip_non_finite_positions() {
        let points = DrawnPoints::new(vec![
            DVec3::new(f64::INFINITY, 0.0, 0.0),
            DVec3::new(1.0, 2.0, 3.0),
            DVec3::new(f64::NAN, 0.0, 0.0),
            DVec3::new(-1.0, 0.0, 0.0),
        ]);
        let bounds = Renderable::from(points).bounds_in_world();
        assert_eq!(bounds.min(), DVec3::new(-1.0, 0.0, 0.0));
        assert_eq!(bounds.max(), DVec3::new(1.0, 2.0, 3.0));

        let mesh = DrawnMesh::new(
            vec![DVec3::ZERO, DVec3::X, DVec3::splat(f64::NEG_INFINITY)],
            vec![[0, 1, 2]],
        );
        assert_eq!(Renderable::from(mesh).bounds_in_world().max(), DVec3::X);

        let only_inf = DrawnPoints::new(vec![DVec3::splat(f64::INFINITY)]);
        assert!(Renderable::from(only_inf).bounds_in_world().is_empty());
    }

    #[test]
    fn test_rotated_bounds_cover_all_corners() {
        let mut points = DrawnPoints::new(vec![DVec3::ZERO, DVec3::new(1.0, 1.0, 0.0)]);
        points.world_from_drawable = DMat4::from_rotation_z(std::f64::consts::FRAC_PI_2);
        let bounds = Renderable::from(points).bounds_in_world();
        assert!((bounds.min() - DVec3::new(-1.0, 0.0, 0.0)).length() < 1e-9);
        assert!((bounds.max() - DVec3::new(0.0, 1.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn test_mesh_ignores_unreferenced_vertices() {
        let mesh = DrawnMesh::new(
            vec![
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(0.0, 1.0, 0.0),
                DVec3::new(100.0, 100.0, 100.0),
            ],
            vec![[0, 1, 2]],
        );
        let bounds = Renderable::from(mesh).bounds_in_world();
        assert_eq!(bounds.max(), DVec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_image_bounds() {
        let image = DrawnImage::new(RgbaImage::new(4, 2));
        let bounds = Renderable::from(image).bounds_in_world();
        assert_eq!(bounds.min(), DVec3::new(-0.5, -0.5, 0.0));
        assert_eq!(bounds.max(), DVec3::new(3.5, 1.5, 0.0));
        assert!(Renderable::from(DrawnImage::default()).bounds_in_world().is_empty());
    }

    #[test]
    fn test_typed_access() {
        let mut r = Renderable::from(DrawnMesh::default());
        assert!(DrawnMesh::from_renderable(&r).is_some());
        assert!(DrawnPoints::from_renderable(&r).is_none());
        DrawnMesh::from_renderable_mut(&mut r)
            .unwrap()
            .triangles
            .push([0, 0, 0]);
        assert_eq!(DrawnMesh::from_renderable(&r).unwrap().triangles.len(), 1);
    }
}
