//! Host mirror of a 2D grid of `f32` texels.
//!
//! Projection lookup tables and renderer uploads are stored as
//! `DeviceBuffer`s. Texels are `channels` consecutive floats, row-major.

use bytemuck::Pod;
use tracing::trace;

use crate::GpuError;
use crate::resource::next_buffer_id;

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceBuffer {
    id: u64,
    label: String,
    width: u32,
    height: u32,
    channels: u32,
    data: Vec<f32>,
}

impl DeviceBuffer {
    /// Create a buffer from texels of type `T`, where `T` is made of `f32`s
    /// (`f32`, `[f32; 2]`, `[f32; 3]`, ...).
    pub fn from_texels<T: Pod>(
        label: impl Into<String>,
        width: u32,
        height: u32,
        texels: &[T],
    ) -> Result<Self, GpuError> {
        let channels = texel_channels::<T>()?;
        let expected = width as usize * height as usize;
        if texels.len() != expected {
            return Err(GpuError::ShapeMismatch {
                expected,
                actual: texels.len(),
            });
        }
        let data: &[f32] = bytemuck::try_cast_slice(texels).map_err(GpuError::Cast)?;
        let buffer = Self {
            id: next_buffer_id(),
            label: label.into(),
            width,
            height,
            channels,
            data: data.to_vec(),
        };
        trace!(
            id = buffer.id,
            label = %buffer.label,
            width,
            height,
            channels,
            "device buffer created"
        );
        Ok(buffer)
    }

    /// Fill a `width` x `height` grid by evaluating `f` at every texel.
    pub fn from_fn<T: Pod, F: FnMut(u32, u32) -> T>(
        label: impl Into<String>,
        width: u32,
        height: u32,
        mut f: F,
    ) -> Result<Self, GpuError> {
        let texels: Vec<T> = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Self::from_texels(label, width, height, &texels)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn as_floats(&self) -> &[f32] {
        &self.data
    }

    /// View the contents as texels of type `T`.
    pub fn texels<T: Pod>(&self) -> Result<&[T], GpuError> {
        let channels = texel_channels::<T>()?;
        if channels != self.channels {
            return Err(GpuError::ChannelMismatch {
                expected: self.channels,
                actual: channels,
            });
        }
        bytemuck::try_cast_slice(&self.data).map_err(GpuError::Cast)
    }

    /// Texel at integer coordinates, or `None` outside the grid.
    pub fn texel<const N: usize>(&self, x: u32, y: u32) -> Option<[f32; N]> {
        if N != self.channels as usize || x >= self.width || y >= self.height {
            return None;
        }
        let start = (y as usize * self.width as usize + x as usize) * N;
        let mut out = [0.0; N];
        out.copy_from_slice(&self.data[start..start + N]);
        Some(out)
    }

    /// Bilinear sample at continuous texel coordinates (texel centers at
    /// integers), clamped to the edge. `None` if the grid is empty or `N`
    /// does not match the channel count.
    pub fn sample_bilinear<const N: usize>(&self, x: f64, y: f64) -> Option<[f32; N]> {
        if self.width == 0 || self.height == 0 || N != self.channels as usize {
            return None;
        }
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let max_x = f64::from(self.width - 1);
        let max_y = f64::from(self.height - 1);
        let x = x.clamp(0.0, max_x);
        let y = y.clamp(0.0, max_y);
        let (x0, y0) = (x.floor(), y.floor());
        let (x1, y1) = ((x0 + 1.0).min(max_x), (y0 + 1.0).min(max_y));
        let (fx, fy) = ((x - x0) as f32, (y - y0) as f32);

        let t00 = self.texel::<N>(x0 as u32, y0 as u32)?;
        let t10 = self.texel::<N>(x1 as u32, y0 as u32)?;
        let t01 = self.texel::<N>(x0 as u32, y1 as u32)?;
        let t11 = self.texel::<N>(x1 as u32, y1 as u32)?;

        let mut out = [0.0; N];
        for c in 0..N {
            let top = t00[c] + (t10[c] - t00[c]) * fx;
            let bottom = t01[c] + (t11[c] - t01[c]) * fx;
            out[c] = top + (bottom - top) * fy;
        }
        Some(out)
    }
}

fn texel_channels<T: Pod>() -> Result<u32, GpuError> {
    let size = std::mem::size_of::<T>();
    if size == 0 || size % std::mem::size_of::<f32>() != 0 {
        return Err(GpuError::TexelSize { bytes: size });
    }
    Ok((size / std::mem::size_of::<f32>()) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BufferHandle, Shared};

    #[test]
    fn test_from_texels_shape() {
        let texels = [[0.0f32, 0.0, 1.0], [1.0, 0.0, 1.0]];
        let buffer = DeviceBuffer::from_texels("rays", 2, 1, &texels).unwrap();
        assert_eq!(buffer.channels(), 3);
        assert_eq!(buffer.texel::<3>(1, 0), Some([1.0, 0.0, 1.0]));
        assert_eq!(buffer.texel::<3>(2, 0), None);
        assert_eq!(buffer.texel::<2>(0, 0), None);

        let err = DeviceBuffer::from_texels("bad", 2, 2, &[1.0f32, 2.0]).unwrap_err();
        assert!(matches!(err, GpuError::ShapeMismatch { expected: 4, actual: 2 }));
    }

    #[test]
    fn test_texel_size_rejected() {
        let err = DeviceBuffer::from_texels("bytes", 1, 1, &[7u8]).unwrap_err();
        assert!(matches!(err, GpuError::TexelSize { bytes: 1 }));
    }

    #[test]
    fn test_typed_view() {
        let buffer = DeviceBuffer::from_fn("uv", 3, 2, |x, y| [x as f32, y as f32]).unwrap();
        let texels = buffer.texels::<[f32; 2]>().unwrap();
        assert_eq!(texels.len(), 6);
        assert_eq!(texels[4], [1.0, 1.0]);
        assert!(matches!(
            buffer.texels::<f32>(),
            Err(GpuError::ChannelMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_bilinear_sampling() {
        let buffer = DeviceBuffer::from_fn("ramp", 3, 3, |x, y| (x + 10 * y) as f32).unwrap();
        assert_eq!(buffer.sample_bilinear::<1>(0.5, 0.0), Some([0.5]));
        assert_eq!(buffer.sample_bilinear::<1>(1.0, 1.5), Some([16.0]));
        // Clamped to the edge.
        assert_eq!(buffer.sample_bilinear::<1>(-4.0, 9.0), Some([20.0]));
        assert_eq!(buffer.sample_bilinear::<1>(f64::NAN, 0.0), None);
    }

    #[test]
    fn test_handle_goes_stale() {
        let buffer: Shared<DeviceBuffer> =
            Shared::new(DeviceBuffer::from_texels("vignette", 1, 1, &[1.0f32]).unwrap());
        let handle = BufferHandle::new(&buffer);
        assert!(handle.is_valid());
        assert_eq!(handle.upgrade().unwrap().label(), "vignette");

        drop(buffer);
        assert!(!handle.is_valid());
        assert!(matches!(handle.upgrade(), Err(GpuError::StaleHandle { .. })));
    }
}
