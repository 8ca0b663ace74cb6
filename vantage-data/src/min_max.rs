//! Min/max reduction over scalars and glam vectors.
//!
//! `MinMax::default()` starts inverted (`lo` at the largest representable
//! value, `hi` at the lowest) so it is the identity of [`MinMax::merge`].

use std::ops::Deref;

use glam::{DVec2, DVec3, IVec2, IVec3, Vec2, Vec3};
use image::{ImageBuffer, Luma, Pixel, Primitive};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// A value type that can be reduced component-wise.
pub trait MinMaxValue: Copy + PartialEq {
    /// Largest representable value (per component).
    const MAX: Self;
    /// Lowest representable value (per component).
    const LOWEST: Self;

    fn min_with(self, other: Self) -> Self;
    fn max_with(self, other: Self) -> Self;

    /// True if every component is finite. Always true for integers.
    fn is_finite_value(self) -> bool;

    /// True if every component of `self` is `<=` the matching one of `other`.
    fn all_le(self, other: Self) -> bool;
}

macro_rules! impl_min_max_int {
    ($($t:ty),*) => {
        $(
            impl MinMaxValue for $t {
                const MAX: Self = <$t>::MAX;
                const LOWEST: Self = <$t>::MIN;

                fn min_with(self, other: Self) -> Self {
                    Ord::min(self, other)
                }

                fn max_with(self, other: Self) -> Self {
                    Ord::max(self, other)
                }

                fn is_finite_value(self) -> bool {
                    true
                }

                fn all_le(self, other: Self) -> bool {
                    self <= other
                }
            }
        )*
    };
}

macro_rules! impl_min_max_float {
    ($($t:ty),*) => {
        $(
            impl MinMaxValue for $t {
                const MAX: Self = <$t>::MAX;
                const LOWEST: Self = <$t>::MIN;

                fn min_with(self, other: Self) -> Self {
                    self.min(other)
                }

                fn max_with(self, other: Self) -> Self {
                    self.max(other)
                }

                fn is_finite_value(self) -> bool {
                    self.is_finite()
                }

                fn all_le(self, other: Self) -> bool {
                    self <= other
                }
            }
        )*
    };
}

macro_rules! impl_min_max_vec {
    ($($t:ty),*) => {
        $(
            impl MinMaxValue for $t {
                const MAX: Self = <$t>::MAX;
                const LOWEST: Self = <$t>::MIN;

                fn min_with(self, other: Self) -> Self {
                    self.min(other)
                }

                fn max_with(self, other: Self) -> Self {
                    self.max(other)
                }

                fn is_finite_value(self) -> bool {
                    self.is_finite()
                }

                fn all_le(self, other: Self) -> bool {
                    self.cmple(other).all()
                }
            }
        )*
    };
}

macro_rules! impl_min_max_ivec {
    ($($t:ty),*) => {
        $(
            impl MinMaxValue for $t {
                const MAX: Self = <$t>::MAX;
                const LOWEST: Self = <$t>::MIN;

                fn min_with(self, other: Self) -> Self {
                    self.min(other)
                }

                fn max_with(self, other: Self) -> Self {
                    self.max(other)
                }

                fn is_finite_value(self) -> bool {
                    true
                }

                fn all_le(self, other: Self) -> bool {
                    self.cmple(other).all()
                }
            }
        )*
    };
}

impl_min_max_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);
impl_min_max_float!(f32, f64);
impl_min_max_vec!(Vec2, Vec3, DVec2, DVec3);
impl_min_max_ivec!(IVec2, IVec3);

/// Running lower/upper bound of a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMax<T> {
    lo: T,
    hi: T,
}

impl<T: MinMaxValue> MinMax<T> {
    pub fn new(lo: T, hi: T) -> Self {
        Self { lo, hi }
    }

    /// Bounds containing exactly one value.
    pub fn from_value(value: T) -> Self {
        Self {
            lo: value,
            hi: value,
        }
    }

    pub fn min(&self) -> T {
        self.lo
    }

    pub fn max(&self) -> T {
        self.hi
    }

    /// Widen the bounds to include `value`.
    pub fn extend(&mut self, value: T) -> &mut Self {
        self.lo = self.lo.min_with(value);
        self.hi = self.hi.max_with(value);
        self
    }

    /// Widen the bounds to include all of `other`.
    pub fn merge(&mut self, other: &MinMax<T>) -> &mut Self {
        self.lo = self.lo.min_with(other.lo);
        self.hi = self.hi.max_with(other.hi);
        self
    }

    pub fn union(mut self, other: &MinMax<T>) -> Self {
        self.merge(other);
        self
    }

    /// True until at least one value has been added.
    pub fn is_empty(&self) -> bool {
        !self.lo.all_le(self.hi)
    }

    pub fn contains(&self, value: T) -> bool {
        self.lo.all_le(value) && value.all_le(self.hi)
    }

    /// Clamp `value` into the bounds. Empty bounds leave `value` untouched.
    pub fn clamp(&self, value: T) -> T {
        if self.is_empty() {
            return value;
        }
        value.max_with(self.lo).min_with(self.hi)
    }
}

impl<T: MinMaxValue> Default for MinMax<T> {
    fn default() -> Self {
        Self {
            lo: T::MAX,
            hi: T::LOWEST,
        }
    }
}

impl<T: MinMaxValue> Extend<T> for MinMax<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            MinMax::extend(self, value);
        }
    }
}

impl<T: MinMaxValue> FromIterator<T> for MinMax<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut bounds = Self::default();
        Extend::extend(&mut bounds, iter);
        bounds
    }
}

impl MinMax<DVec3> {
    pub fn center(&self) -> DVec3 {
        (self.lo + self.hi) * 0.5
    }

    pub fn size(&self) -> DVec3 {
        if self.is_empty() {
            DVec3::ZERO
        } else {
            self.hi - self.lo
        }
    }
}

/// Reduce only the finite values of `values`.
pub fn finite_min_max_iter<T, I>(values: I) -> MinMax<T>
where
    T: MinMaxValue,
    I: IntoIterator<Item = T>,
{
    values.into_iter().filter(|v| v.is_finite_value()).collect()
}

/// Bounds of the finite samples of a single channel image. NaN and infinite
/// samples are skipped.
pub fn finite_min_max<T, C>(image: &ImageBuffer<Luma<T>, C>) -> MinMax<T>
where
    T: MinMaxValue + Primitive + 'static,
    Luma<T>: Pixel<Subpixel = T>,
    C: Deref<Target = [T]>,
{
    let bounds = finite_min_max_iter(image.pixels().map(|pixel| pixel.0[0]));
    if bounds.is_empty() {
        trace!(
            width = image.width(),
            height = image.height(),
            "image has no finite samples"
        );
    }
    bounds
}
