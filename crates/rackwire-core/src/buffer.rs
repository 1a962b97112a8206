//! Typed port buffers and the store the engine executes against.
//!
//! Every output port and every input port owns one [`Buffer`] in the
//! [`BufferStore`], addressed by [`BufferId`]. Buffers are sized to the block
//! length once, when a compiled program is installed, and never reallocated
//! while blocks run.

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use crate::element::{Element, ElementType, Transfer, transfer_block};

/// Index of a buffer in a [`BufferStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(pub(crate) u32);

impl BufferId {
    /// Returns the raw index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl core::fmt::Display for BufferId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "buf[{}]", self.0)
    }
}

/// One block of samples of a single element type.
#[derive(Clone, Debug, PartialEq)]
pub enum Buffer {
    /// `f32` samples.
    F32(Vec<f32>),
    /// `f64` samples.
    F64(Vec<f64>),
    /// `i32` values.
    I32(Vec<i32>),
}

impl Default for Buffer {
    /// An empty, unallocated buffer.
    fn default() -> Self {
        Self::F32(Vec::new())
    }
}

impl Buffer {
    /// Creates a zeroed buffer of the given element type and block size.
    pub fn new(element: ElementType, block_size: usize) -> Self {
        match element {
            ElementType::F32 => Self::F32(vec![0.0; block_size]),
            ElementType::F64 => Self::F64(vec![0.0; block_size]),
            ElementType::I32 => Self::I32(vec![0; block_size]),
        }
    }

    /// Returns the element type held by this buffer.
    pub fn element(&self) -> ElementType {
        match self {
            Self::F32(_) => ElementType::F32,
            Self::F64(_) => ElementType::F64,
            Self::I32(_) => ElementType::I32,
        }
    }

    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::I32(v) => v.len(),
        }
    }

    /// Returns true if the buffer has zero length.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fills the buffer with zeros.
    pub fn clear(&mut self) {
        match self {
            Self::F32(v) => v.fill(0.0),
            Self::F64(v) => v.fill(0.0),
            Self::I32(v) => v.fill(0),
        }
    }

    /// Resizes to the given block size, zeroing new samples.
    pub fn resize(&mut self, block_size: usize) {
        match self {
            Self::F32(v) => v.resize(block_size, 0.0),
            Self::F64(v) => v.resize(block_size, 0.0),
            Self::I32(v) => v.resize(block_size, 0),
        }
    }

    /// Borrows the samples as `T`, or `None` if the element type differs.
    #[inline]
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice(self)
    }

    /// Mutably borrows the samples as `T`, or `None` if the element type differs.
    #[inline]
    pub fn as_mut_slice<T: Element>(&mut self) -> Option<&mut [T]> {
        T::slice_mut(self)
    }

    /// Returns the first `frames` samples as `T`.
    ///
    /// # Panics
    ///
    /// Panics if the element type differs. A typed read of the wrong element
    /// type means a program and its storage diverged, which is fatal.
    #[inline]
    pub(crate) fn expect_slice<T: Element>(&self, frames: usize) -> &[T] {
        let element = self.element();
        match T::slice(self) {
            Some(s) => &s[..frames],
            None => panic!("buffer holds {element}, read as {}", T::TYPE),
        }
    }

    /// Mutable counterpart of [`expect_slice`](Self::expect_slice).
    #[inline]
    pub(crate) fn expect_slice_mut<T: Element>(&mut self, frames: usize) -> &mut [T] {
        let element = self.element();
        match T::slice_mut(self) {
            Some(s) => &mut s[..frames],
            None => panic!("buffer holds {element}, written as {}", T::TYPE),
        }
    }
}

/// Flat storage for every port buffer of one compiled graph.
///
/// The store is sized from a [`BufferLayout`](crate::BufferLayout) when a
/// program is installed; afterwards the audio path only indexes into it.
#[derive(Debug, Default)]
pub struct BufferStore {
    buffers: Vec<Buffer>,
    block_size: usize,
}

impl BufferStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the store with one buffer per element type in `elements`.
    ///
    /// Buffers whose element type is unchanged are kept and resized, so a
    /// recompile of the same topology does not reallocate.
    pub fn rebuild(&mut self, elements: &[ElementType], block_size: usize) {
        self.buffers.truncate(elements.len());
        for (buf, &element) in self.buffers.iter_mut().zip(elements) {
            if buf.element() == element {
                buf.resize(block_size);
            } else {
                *buf = Buffer::new(element, block_size);
            }
        }
        let existing = self.buffers.len();
        self.buffers.extend(
            elements[existing..]
                .iter()
                .map(|&element| Buffer::new(element, block_size)),
        );
        self.block_size = block_size;
    }

    /// Returns the number of buffers.
    pub fn count(&self) -> usize {
        self.buffers.len()
    }

    /// Returns the block size of each buffer.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns a reference to the buffer with the given id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    #[inline]
    pub fn get(&self, id: BufferId) -> &Buffer {
        &self.buffers[id.index()]
    }

    /// Returns a mutable reference to the buffer with the given id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    #[inline]
    pub fn get_mut(&mut self, id: BufferId) -> &mut Buffer {
        &mut self.buffers[id.index()]
    }

    /// Clears every buffer to zero.
    pub fn clear_all(&mut self) {
        for buf in &mut self.buffers {
            buf.clear();
        }
    }

    /// Exchanges the buffer at `id` with `other` without copying samples.
    #[inline]
    pub(crate) fn swap(&mut self, id: BufferId, other: &mut Buffer) {
        core::mem::swap(&mut self.buffers[id.index()], other);
    }

    /// Runs the `Copy`/`Add` kernel: `dst (+)= src * gain * ctl` over the first
    /// `frames` samples.
    ///
    /// # Panics
    ///
    /// Panics if `dst` is also a source, or if a buffer's element type does
    /// not match `transfer`. Both mean the program is stale.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn transfer(
        &mut self,
        transfer: Transfer,
        src: BufferId,
        dst: BufferId,
        ctl: Option<BufferId>,
        gain: f32,
        accumulate: bool,
        frames: usize,
    ) {
        let (dst_buf, src_buf, ctl_buf) = self.write_with_reads(dst, src, ctl);
        let ctl = ctl_buf.map(|c| c.expect_slice::<f32>(frames));
        match transfer {
            Transfer::F32FromF32 => transfer_block::<f32, f32>(
                dst_buf.expect_slice_mut(frames),
                src_buf.expect_slice(frames),
                ctl,
                gain,
                accumulate,
            ),
            Transfer::F32FromF64 => transfer_block::<f32, f64>(
                dst_buf.expect_slice_mut(frames),
                src_buf.expect_slice(frames),
                ctl,
                gain,
                accumulate,
            ),
            Transfer::F32FromI32 => transfer_block::<f32, i32>(
                dst_buf.expect_slice_mut(frames),
                src_buf.expect_slice(frames),
                ctl,
                gain,
                accumulate,
            ),
            Transfer::F64FromF32 => transfer_block::<f64, f32>(
                dst_buf.expect_slice_mut(frames),
                src_buf.expect_slice(frames),
                ctl,
                gain,
                accumulate,
            ),
            Transfer::F64FromF64 => transfer_block::<f64, f64>(
                dst_buf.expect_slice_mut(frames),
                src_buf.expect_slice(frames),
                ctl,
                gain,
                accumulate,
            ),
            Transfer::F64FromI32 => transfer_block::<f64, i32>(
                dst_buf.expect_slice_mut(frames),
                src_buf.expect_slice(frames),
                ctl,
                gain,
                accumulate,
            ),
            Transfer::I32FromI32 => transfer_block::<i32, i32>(
                dst_buf.expect_slice_mut(frames),
                src_buf.expect_slice(frames),
                ctl,
                gain,
                accumulate,
            ),
        }
    }

    /// Borrows `dst` mutably alongside read-only `src` and `ctl`.
    fn write_with_reads(
        &mut self,
        dst: BufferId,
        src: BufferId,
        ctl: Option<BufferId>,
    ) -> (&mut Buffer, &Buffer, Option<&Buffer>) {
        let d = dst.index();
        assert!(
            src != dst && ctl != Some(dst),
            "transfer into {dst} reads its own destination"
        );
        let (head, rest) = self.buffers.split_at_mut(d);
        let (target, tail) = rest
            .split_first_mut()
            .unwrap_or_else(|| panic!("{dst} out of range"));
        let head: &[Buffer] = head;
        let tail: &[Buffer] = tail;
        let src = pick(head, tail, d, src.index());
        let ctl = ctl.map(|c| pick(head, tail, d, c.index()));
        (target, src, ctl)
    }
}

/// Reads index `i` from a slice split around the excluded index `split`.
#[inline]
fn pick<'a>(head: &'a [Buffer], tail: &'a [Buffer], split: usize, i: usize) -> &'a Buffer {
    if i < split {
        &head[i]
    } else {
        &tail[i - split - 1]
    }
}
