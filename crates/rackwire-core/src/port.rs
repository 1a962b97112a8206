//! Port descriptions and handles.
//!
//! A module declares its ports statically through [`PortSpec`]s. Everything
//! else refers to a port by index ([`PortRef`]): typed handles
//! ([`InputPort`], [`OutputPort`]) add the element type as a phantom so links
//! can be type-checked when they are built, and untyped [`PortHandle`]s come
//! from the live graph so that check can be repeated at compile time.

use core::fmt;
use core::marker::PhantomData;

use crate::element::{Element, ElementType};
use crate::module::ModuleId;

/// Maximum number of inputs (and, separately, outputs) per module.
///
/// Matches the width of [`PortMask`](crate::PortMask).
pub const MAX_PORTS: usize = 64;

/// Whether a port consumes or produces values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Consumes values; holds an accumulation buffer.
    Input,
    /// Produces values during the owning module's render.
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Static description of one port slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortSpec {
    /// Debug name, unique among the module's inputs (or outputs).
    pub name: &'static str,
    /// Element type of the port's buffer.
    pub element: ElementType,
    /// Input ports only: several links into this port are summed.
    pub summing: bool,
}

impl PortSpec {
    /// Describes a port holding elements of type `T`.
    pub const fn of<T: Element>(name: &'static str) -> Self {
        Self {
            name,
            element: T::TYPE,
            summing: false,
        }
    }

    /// Describes a port with a runtime element type.
    pub const fn new(name: &'static str, element: ElementType) -> Self {
        Self {
            name,
            element,
            summing: false,
        }
    }

    /// Marks an input as summing: any number of links may feed it and their
    /// contributions are added.
    pub const fn summing(mut self) -> Self {
        self.summing = true;
        self
    }
}

/// A port named by owning module and index within that module's inputs or
/// outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortRef {
    /// Owning module.
    pub module: ModuleId,
    /// Index within the module's inputs or outputs.
    pub index: u16,
}

impl PortRef {
    /// Creates a port reference.
    pub const fn new(module: ModuleId, index: u16) -> Self {
        Self { module, index }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.index)
    }
}

/// A port resolved against the live graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PortHandle {
    /// Which port.
    pub port: PortRef,
    /// Input or output.
    pub direction: Direction,
    /// The element type the module declares for it.
    pub element: ElementType,
}

macro_rules! typed_port {
    ($(#[$meta:meta])* $name:ident, $direction:expr) => {
        $(#[$meta])*
        pub struct $name<T> {
            port: PortRef,
            _element: PhantomData<fn() -> T>,
        }

        impl<T: Element> $name<T> {
            /// Creates a handle for port `index` of `module`.
            ///
            /// Nothing is checked here; the link built from this handle is
            /// checked against the live graph on `connect` and `compile`.
            pub const fn new(module: ModuleId, index: u16) -> Self {
                Self {
                    port: PortRef::new(module, index),
                    _element: PhantomData,
                }
            }

            /// Returns the untyped port reference.
            pub const fn port(self) -> PortRef {
                self.port
            }

            /// Returns the owning module.
            pub const fn module(self) -> ModuleId {
                self.port.module
            }

            /// Returns the port index.
            pub const fn index(self) -> u16 {
                self.port.index
            }

            /// Returns the handle this typed port claims to be.
            pub const fn handle(self) -> PortHandle {
                PortHandle {
                    port: self.port,
                    direction: $direction,
                    element: T::TYPE,
                }
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> PartialEq for $name<T> {
            fn eq(&self, other: &Self) -> bool {
                self.port == other.port
            }
        }

        impl<T> Eq for $name<T> {}

        impl<T: Element> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("port", &self.port)
                    .field("element", &T::TYPE)
                    .finish()
            }
        }
    };
}

typed_port!(
    /// Typed handle to an input port holding `T` elements.
    InputPort,
    Direction::Input
);

typed_port!(
    /// Typed handle to an output port producing `T` elements.
    OutputPort,
    Direction::Output
);
