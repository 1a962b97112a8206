//! Links between module ports.
//!
//! A [`Link`] wires one output to one input, optionally scaled by a constant
//! and multiplied per sample by an `f32` control output. It never executes by
//! itself: the compiler asks it for the [`Action`] that realises it.

use core::fmt;

use super::action::Action;
use super::error::GraphError;
use crate::buffer::BufferId;
use crate::element::{ConvertFrom, Element, ElementType, FloatElement, Transfer};
use crate::module::ModuleId;
use crate::port::{Direction, InputPort, OutputPort, PortHandle, PortRef};

/// Unique identifier for a link in a [`ModuleGraph`](super::ModuleGraph).
///
/// Link IDs are assigned sequentially and never reused within a graph instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkId(pub(crate) u32);

impl LinkId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkId({})", self.0)
    }
}

/// A directed wire from an output port to an input port.
///
/// The transfer rule is `dest[i] = convert(src[i]) * scale * ctl[i]`, with
/// `ctl[i] = 1` when there is no control port.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Link {
    dest: PortRef,
    src: PortRef,
    ctl: Option<PortRef>,
    scale: f32,
    transfer: Transfer,
    summing: bool,
}

impl Link {
    /// Links `src` into `dest` at unity gain.
    pub fn new<D, S>(dest: InputPort<D>, src: OutputPort<S>) -> Self
    where
        D: ConvertFrom<S>,
        S: Element,
    {
        Self {
            dest: dest.port(),
            src: src.port(),
            ctl: None,
            scale: 1.0,
            transfer: D::TRANSFER,
            summing: false,
        }
    }

    /// Links `src` into `dest`, multiplied by a constant.
    pub fn scaled<D, S>(dest: InputPort<D>, src: OutputPort<S>, scale: f32) -> Self
    where
        D: FloatElement + ConvertFrom<S>,
        S: Element,
    {
        Self {
            scale,
            ..Self::new(dest, src)
        }
    }

    /// Links `src` into `dest`, multiplied by a constant and per sample by
    /// `ctl`.
    pub fn controlled<D, S>(
        dest: InputPort<D>,
        src: OutputPort<S>,
        ctl: OutputPort<f32>,
        scale: f32,
    ) -> Self
    where
        D: FloatElement + ConvertFrom<S>,
        S: Element,
    {
        Self {
            ctl: Some(ctl.port()),
            scale,
            ..Self::new(dest, src)
        }
    }

    /// Builds a link from ports resolved at run time, such as those named in
    /// a patch file.
    ///
    /// # Errors
    ///
    /// - [`GraphError::WrongDirection`] if `dest` is not an input, or `src`
    ///   or `ctl` is not an output
    /// - [`GraphError::TypeMismatch`] if no conversion from `src` to `dest`
    ///   exists, or `ctl` is not `f32`
    /// - [`GraphError::UnscalableInput`] if a scaled or controlled link
    ///   targets an integer input
    pub fn dynamic(
        dest: PortHandle,
        src: PortHandle,
        ctl: Option<PortHandle>,
        scale: f32,
    ) -> Result<Self, GraphError> {
        expect_direction(dest, Direction::Input)?;
        expect_direction(src, Direction::Output)?;
        if let Some(ctl) = ctl {
            expect_control(ctl)?;
        }
        let transfer =
            Transfer::resolve(dest.element, src.element).ok_or(GraphError::TypeMismatch {
                port: src.port,
                expected: dest.element,
                found: src.element,
            })?;
        if (scale != 1.0 || ctl.is_some()) && !dest.element.is_float() {
            return Err(GraphError::UnscalableInput {
                port: dest.port,
                element: dest.element,
            });
        }
        Ok(Self {
            dest: dest.port,
            src: src.port,
            ctl: ctl.map(|c| c.port),
            scale,
            transfer,
            summing: false,
        })
    }

    /// Marks the link as accumulating into its input, as if the input
    /// port were declared summing.
    pub fn summing(mut self) -> Self {
        self.summing = true;
        self
    }

    /// The input port written.
    pub fn dest(&self) -> PortRef {
        self.dest
    }

    /// The output port read.
    pub fn src(&self) -> PortRef {
        self.src
    }

    /// The control output, if any.
    pub fn ctl(&self) -> Option<PortRef> {
        self.ctl
    }

    /// The constant gain.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// The captured element conversion.
    pub fn transfer(&self) -> Transfer {
        self.transfer
    }

    /// Whether the link asked for summation.
    pub fn is_summing(&self) -> bool {
        self.summing
    }

    /// True for an unscaled, uncontrolled link.
    pub fn is_plain(&self) -> bool {
        self.scale == 1.0 && self.ctl.is_none()
    }

    /// Modules this link reads from: the source and, if present, the control.
    pub fn producers(&self) -> impl Iterator<Item = ModuleId> {
        core::iter::once(self.src.module).chain(self.ctl.map(|c| c.module))
    }

    /// Verifies the captured tags against ports resolved from the live graph.
    ///
    /// # Errors
    ///
    /// [`GraphError::WrongDirection`] or [`GraphError::TypeMismatch`] naming
    /// the first port that disagrees.
    pub fn check(
        &self,
        dest: PortHandle,
        src: PortHandle,
        ctl: Option<PortHandle>,
    ) -> Result<(), GraphError> {
        expect_direction(dest, Direction::Input)?;
        expect_direction(src, Direction::Output)?;
        expect_element(dest, self.transfer.dest())?;
        expect_element(src, self.transfer.source())?;
        match (self.ctl, ctl) {
            (Some(_), Some(ctl)) => expect_control(ctl),
            (None, None) => Ok(()),
            (Some(port), None) | (None, Some(PortHandle { port, .. })) => {
                Err(GraphError::WrongDirection {
                    port,
                    expected: Direction::Output,
                })
            }
        }
    }

    /// Builds the `Copy` action writing this link into `dst`.
    pub fn make_copy_action(&self, src: BufferId, dst: BufferId, ctl: Option<BufferId>) -> Action {
        Action::Copy {
            src,
            dst,
            ctl,
            gain: self.scale,
            transfer: self.transfer,
        }
    }

    /// Builds the `Add` action accumulating this link into `dst`.
    pub fn make_add_action(&self, src: BufferId, dst: BufferId, ctl: Option<BufferId>) -> Action {
        Action::Add {
            src,
            dst,
            ctl,
            gain: self.scale,
            transfer: self.transfer,
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.src, self.dest)?;
        if self.scale != 1.0 {
            write!(f, " ×{:.2}", self.scale)?;
        }
        if let Some(ctl) = self.ctl {
            write!(f, " ctl {ctl}")?;
        }
        Ok(())
    }
}

fn expect_direction(handle: PortHandle, expected: Direction) -> Result<(), GraphError> {
    if handle.direction == expected {
        Ok(())
    } else {
        Err(GraphError::WrongDirection {
            port: handle.port,
            expected,
        })
    }
}

fn expect_element(handle: PortHandle, expected: ElementType) -> Result<(), GraphError> {
    if handle.element == expected {
        Ok(())
    } else {
        Err(GraphError::TypeMismatch {
            port: handle.port,
            expected,
            found: handle.element,
        })
    }
}

fn expect_control(ctl: PortHandle) -> Result<(), GraphError> {
    expect_direction(ctl, Direction::Output)?;
    expect_element(ctl, ElementType::F32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(module: u32, index: u16, direction: Direction, element: ElementType) -> PortHandle {
        PortHandle {
            port: PortRef::new(ModuleId(module), index),
            direction,
            element,
        }
    }

    #[test]
    fn test_new_captures_transfer() {
        let link = Link::new(
            InputPort::<f32>::new(ModuleId(1), 0),
            OutputPort::<f64>::new(ModuleId(0), 0),
        );
        assert_eq!(link.transfer(), Transfer::F32FromF64);
        assert!(link.is_plain());
        assert!(!link.is_summing());
    }

    #[test]
    fn test_controlled_is_not_plain() {
        let link = Link::controlled(
            InputPort::<f32>::new(ModuleId(2), 0),
            OutputPort::<f32>::new(ModuleId(0), 0),
            OutputPort::<f32>::new(ModuleId(1), 0),
            1.0,
        );
        assert!(!link.is_plain());
        let producers: Vec<_> = link.producers().collect();
        assert_eq!(producers, vec![ModuleId(0), ModuleId(1)]);
    }

    #[test]
    fn test_dynamic_rejects_float_into_int() {
        let err = Link::dynamic(
            handle(1, 0, Direction::Input, ElementType::I32),
            handle(0, 0, Direction::Output, ElementType::F32),
            None,
            1.0,
        )
        .unwrap_err();
        assert!(matches!(err, GraphError::TypeMismatch { .. }));
    }

    #[test]
    fn test_dynamic_rejects_scaled_int() {
        let err = Link::dynamic(
            handle(1, 0, Direction::Input, ElementType::I32),
            handle(0, 0, Direction::Output, ElementType::I32),
            None,
            0.5,
        )
        .unwrap_err();
        assert!(matches!(err, GraphError::UnscalableInput { .. }));
    }

    #[test]
    fn test_dynamic_rejects_swapped_direction() {
        let err = Link::dynamic(
            handle(0, 0, Direction::Output, ElementType::F32),
            handle(1, 0, Direction::Input, ElementType::F32),
            None,
            1.0,
        )
        .unwrap_err();
        assert_eq!(
            err,
            GraphError::WrongDirection {
                port: PortRef::new(ModuleId(0), 0),
                expected: Direction::Input,
            }
        );
    }

    #[test]
    fn test_dynamic_control_must_be_f32() {
        let err = Link::dynamic(
            handle(2, 0, Direction::Input, ElementType::F32),
            handle(0, 0, Direction::Output, ElementType::F32),
            Some(handle(1, 0, Direction::Output, ElementType::F64)),
            1.0,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GraphError::TypeMismatch {
                expected: ElementType::F32,
                found: ElementType::F64,
                ..
            }
        ));
    }

    #[test]
    fn test_check_detects_drifted_port() {
        let link = Link::new(
            InputPort::<f32>::new(ModuleId(1), 0),
            OutputPort::<f32>::new(ModuleId(0), 0),
        );
        let live_src = handle(0, 0, Direction::Output, ElementType::I32);
        let live_dest = handle(1, 0, Direction::Input, ElementType::F32);
        assert_eq!(
            link.check(live_dest, live_src, None),
            Err(GraphError::TypeMismatch {
                port: live_src.port,
                expected: ElementType::F32,
                found: ElementType::I32,
            })
        );
    }

    #[test]
    fn test_make_actions_carry_gain() {
        let link = Link::scaled(
            InputPort::<f32>::new(ModuleId(1), 0),
            OutputPort::<f32>::new(ModuleId(0), 0),
            0.5,
        );
        let copy = link.make_copy_action(BufferId(0), BufferId(3), None);
        assert_eq!(
            copy,
            Action::Copy {
                src: BufferId(0),
                dst: BufferId(3),
                ctl: None,
                gain: 0.5,
                transfer: Transfer::F32FromF32,
            }
        );
        assert!(matches!(
            link.make_add_action(BufferId(0), BufferId(3), None),
            Action::Add { gain, .. } if gain == 0.5
        ));
    }
}
