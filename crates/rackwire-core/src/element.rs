//! Buffer element types and the conversions a link may perform.
//!
//! Every port carries one [`ElementType`]. A [`Link`](crate::Link) between two
//! ports needs a conversion from the source element to the destination
//! element; those conversions are expressed twice:
//!
//! - at build time through the [`ConvertFrom`] trait bound, so an `i32` input
//!   fed from an `f32` output does not compile;
//! - at run time through the closed [`Transfer`] tag captured by the link,
//!   which the engine matches on to pick a monomorphic copy kernel.

use core::fmt;

use crate::buffer::Buffer;

/// Runtime tag for a port's element type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// 32-bit float samples (audio and control signals).
    F32,
    /// 64-bit float samples (phase, pitch and other precision-sensitive values).
    F64,
    /// 32-bit integer values (gates, note numbers, stepped selectors).
    I32,
}

impl ElementType {
    /// Returns the Rust type name of the element.
    pub const fn name(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::I32 => "i32",
        }
    }

    /// Returns true for floating-point elements, which accept scaled links.
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for i32 {}
}

/// A value type that can live in a port buffer.
///
/// Sealed: the engine's [`Transfer`] tag enumerates every conversion between
/// element types, so the set of elements is closed.
pub trait Element:
    Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static + sealed::Sealed
{
    /// Runtime tag for this element type.
    const TYPE: ElementType;

    /// Borrows a buffer's samples if it holds this element type.
    fn slice(buffer: &Buffer) -> Option<&[Self]>;

    /// Mutably borrows a buffer's samples if it holds this element type.
    fn slice_mut(buffer: &mut Buffer) -> Option<&mut [Self]>;

    /// Multiplies by a gain factor.
    fn scale(self, gain: f32) -> Self;

    /// Sums two values (wrapping for integers).
    fn accumulate(self, other: Self) -> Self;
}

impl Element for f32 {
    const TYPE: ElementType = ElementType::F32;

    #[inline]
    fn slice(buffer: &Buffer) -> Option<&[Self]> {
        match buffer {
            Buffer::F32(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    #[inline]
    fn slice_mut(buffer: &mut Buffer) -> Option<&mut [Self]> {
        match buffer {
            Buffer::F32(v) => Some(v.as_mut_slice()),
            _ => None,
        }
    }

    #[inline]
    fn scale(self, gain: f32) -> Self {
        self * gain
    }

    #[inline]
    fn accumulate(self, other: Self) -> Self {
        self + other
    }
}

impl Element for f64 {
    const TYPE: ElementType = ElementType::F64;

    #[inline]
    fn slice(buffer: &Buffer) -> Option<&[Self]> {
        match buffer {
            Buffer::F64(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    #[inline]
    fn slice_mut(buffer: &mut Buffer) -> Option<&mut [Self]> {
        match buffer {
            Buffer::F64(v) => Some(v.as_mut_slice()),
            _ => None,
        }
    }

    #[inline]
    fn scale(self, gain: f32) -> Self {
        self * f64::from(gain)
    }

    #[inline]
    fn accumulate(self, other: Self) -> Self {
        self + other
    }
}

impl Element for i32 {
    const TYPE: ElementType = ElementType::I32;

    #[inline]
    fn slice(buffer: &Buffer) -> Option<&[Self]> {
        match buffer {
            Buffer::I32(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    #[inline]
    fn slice_mut(buffer: &mut Buffer) -> Option<&mut [Self]> {
        match buffer {
            Buffer::I32(v) => Some(v.as_mut_slice()),
            _ => None,
        }
    }

    /// Integer links are never scaled (see [`FloatElement`]); a unity gain is
    /// the only value the engine passes here.
    #[inline]
    fn scale(self, gain: f32) -> Self {
        if gain == 1.0 {
            self
        } else {
            (self as f32 * gain) as i32
        }
    }

    #[inline]
    fn accumulate(self, other: Self) -> Self {
        self.wrapping_add(other)
    }
}

/// Floating-point elements, the only destinations a scaled or controlled link
/// may target.
pub trait FloatElement: Element {}

impl FloatElement for f32 {}
impl FloatElement for f64 {}

/// The conversion a link performs, as a closed runtime tag.
///
/// Named `<Dest>From<Source>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Transfer {
    /// `f32 ← f32`
    F32FromF32,
    /// `f32 ← f64`
    F32FromF64,
    /// `f32 ← i32`
    F32FromI32,
    /// `f64 ← f32`
    F64FromF32,
    /// `f64 ← f64`
    F64FromF64,
    /// `f64 ← i32`
    F64FromI32,
    /// `i32 ← i32`
    I32FromI32,
}

impl Transfer {
    /// Resolves the conversion from `source` to `dest`, if one exists.
    ///
    /// Floats never narrow into integers.
    pub const fn resolve(dest: ElementType, source: ElementType) -> Option<Self> {
        use ElementType::{F32, F64, I32};
        match (dest, source) {
            (F32, F32) => Some(Self::F32FromF32),
            (F32, F64) => Some(Self::F32FromF64),
            (F32, I32) => Some(Self::F32FromI32),
            (F64, F32) => Some(Self::F64FromF32),
            (F64, F64) => Some(Self::F64FromF64),
            (F64, I32) => Some(Self::F64FromI32),
            (I32, I32) => Some(Self::I32FromI32),
            (I32, F32 | F64) => None,
        }
    }

    /// Destination element type.
    pub const fn dest(self) -> ElementType {
        match self {
            Self::F32FromF32 | Self::F32FromF64 | Self::F32FromI32 => ElementType::F32,
            Self::F64FromF32 | Self::F64FromF64 | Self::F64FromI32 => ElementType::F64,
            Self::I32FromI32 => ElementType::I32,
        }
    }

    /// Source element type.
    pub const fn source(self) -> ElementType {
        match self {
            Self::F32FromF32 | Self::F64FromF32 => ElementType::F32,
            Self::F32FromF64 | Self::F64FromF64 => ElementType::F64,
            Self::F32FromI32 | Self::F64FromI32 | Self::I32FromI32 => ElementType::I32,
        }
    }

    /// Returns true when source and destination share an element type, so
    /// the destination can alias the source buffer.
    pub const fn is_identity(self) -> bool {
        matches!(
            self,
            Self::F32FromF32 | Self::F64FromF64 | Self::I32FromI32
        )
    }
}

/// Build-time proof that `Self` can be produced from `S`.
pub trait ConvertFrom<S: Element>: Element {
    /// The runtime tag for this conversion.
    const TRANSFER: Transfer;

    /// Converts one value.
    fn convert(value: S) -> Self;
}

macro_rules! impl_convert {
    ($dest:ty, $src:ty, $tag:ident, |$v:ident| $body:expr) => {
        impl ConvertFrom<$src> for $dest {
            const TRANSFER: Transfer = Transfer::$tag;

            #[inline]
            fn convert($v: $src) -> Self {
                $body
            }
        }
    };
}

impl_convert!(f32, f32, F32FromF32, |v| v);
impl_convert!(f32, f64, F32FromF64, |v| v as f32);
impl_convert!(f32, i32, F32FromI32, |v| v as f32);
impl_convert!(f64, f32, F64FromF32, |v| f64::from(v));
impl_convert!(f64, f64, F64FromF64, |v| v);
impl_convert!(f64, i32, F64FromI32, |v| f64::from(v));
impl_convert!(i32, i32, I32FromI32, |v| v);

/// Per-sample kernel behind `Copy` and `Add` actions.
///
/// `dst[i] = convert(src[i]) * gain * ctl[i]`, or `+=` when `accumulate`.
/// All slices are cut to the shortest length.
#[inline]
pub(crate) fn transfer_block<D, S>(
    dst: &mut [D],
    src: &[S],
    ctl: Option<&[f32]>,
    gain: f32,
    accumulate: bool,
) where
    D: ConvertFrom<S>,
    S: Element,
{
    match (ctl, accumulate) {
        (None, false) => {
            for (d, &s) in dst.iter_mut().zip(src) {
                *d = D::convert(s).scale(gain);
            }
        }
        (None, true) => {
            for (d, &s) in dst.iter_mut().zip(src) {
                *d = d.accumulate(D::convert(s).scale(gain));
            }
        }
        (Some(ctl), false) => {
            for ((d, &s), &c) in dst.iter_mut().zip(src).zip(ctl) {
                *d = D::convert(s).scale(gain * c);
            }
        }
        (Some(ctl), true) => {
            for ((d, &s), &c) in dst.iter_mut().zip(src).zip(ctl) {
                *d = d.accumulate(D::convert(s).scale(gain * c));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_matches_trait_tags() {
        assert_eq!(
            Transfer::resolve(ElementType::F32, ElementType::F64),
            Some(<f32 as ConvertFrom<f64>>::TRANSFER)
        );
        assert_eq!(
            Transfer::resolve(ElementType::I32, ElementType::I32),
            Some(<i32 as ConvertFrom<i32>>::TRANSFER)
        );
        assert_eq!(
            Transfer::resolve(ElementType::F64, ElementType::I32),
            Some(<f64 as ConvertFrom<i32>>::TRANSFER)
        );
    }

    #[test]
    fn test_resolve_rejects_float_to_int() {
        assert_eq!(Transfer::resolve(ElementType::I32, ElementType::F32), None);
        assert_eq!(Transfer::resolve(ElementType::I32, ElementType::F64), None);
    }

    #[test]
    fn test_transfer_endpoints() {
        let t = Transfer::F64FromI32;
        assert_eq!(t.dest(), ElementType::F64);
        assert_eq!(t.source(), ElementType::I32);
        assert!(!t.is_identity());
        assert!(Transfer::F32FromF32.is_identity());
    }

    #[test]
    fn test_transfer_block_copy_and_add() {
        let src = [1.0f32, 2.0, 3.0];
        let mut dst = [9.0f32; 3];
        transfer_block(&mut dst, &src, None, 0.5, false);
        assert_eq!(dst, [0.5, 1.0, 1.5]);
        transfer_block(&mut dst, &src, None, 1.0, true);
        assert_eq!(dst, [1.5, 3.0, 4.5]);
    }

    #[test]
    fn test_transfer_block_with_control() {
        let src = [2.0f64, 2.0, 2.0];
        let ctl = [0.0f32, 0.5, 1.0];
        let mut dst = [0.0f32; 3];
        transfer_block(&mut dst, &src, Some(&ctl), 2.0, false);
        assert_eq!(dst, [0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_transfer_block_int_to_float() {
        let src = [1i32, -2, 3];
        let mut dst = [0.0f64; 3];
        transfer_block(&mut dst, &src, None, 1.0, false);
        assert_eq!(dst, [1.0, -2.0, 3.0]);
    }

    #[test]
    fn test_integer_accumulate_wraps() {
        assert_eq!(i32::MAX.accumulate(1), i32::MIN);
        assert_eq!(7i32.scale(1.0), 7);
    }
}
