//! Errors reported by graph mutation and compilation.
//!
//! Every error here is raised before a block runs. Once a program compiles,
//! executing it cannot fail; a failure at that point means the program is
//! stale and the engine panics instead of returning an error.

#[cfg(not(feature = "std"))]
use alloc::string::String;

use thiserror::Error;

use super::link::LinkId;
use crate::element::ElementType;
use crate::module::ModuleId;
use crate::port::{Direction, PortRef};

/// Errors that can occur during graph operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A link's captured element type disagrees with the live port.
    #[error("type mismatch at port {port}: link expects {expected}, port holds {found}")]
    TypeMismatch {
        /// The port whose type disagrees.
        port: PortRef,
        /// Element type the link was built for.
        expected: ElementType,
        /// Element type the live port declares.
        found: ElementType,
    },

    /// A handle names an input where an output is required, or vice versa.
    #[error("port {port} used as {expected}")]
    WrongDirection {
        /// The port used in the wrong role.
        port: PortRef,
        /// The direction the link needs.
        expected: Direction,
    },

    /// A scaled or controlled link targets an integer input.
    #[error("port {port} holds {element} and cannot take a scaled link")]
    UnscalableInput {
        /// The integer input.
        port: PortRef,
        /// Its element type.
        element: ElementType,
    },

    /// Several unscaled links feed one input that does not sum.
    #[error("input {input} has {links} unscaled links and no summation policy")]
    AmbiguousWiring {
        /// The input port with conflicting writers.
        input: PortRef,
        /// Number of links into it.
        links: usize,
    },

    /// The module dependency graph contains a cycle.
    #[error("module graph has a cycle through {module}")]
    CycleDetected {
        /// A module on the cycle.
        module: ModuleId,
    },

    /// The specified module was not found in the graph.
    #[error("module {0} not found")]
    ModuleNotFound(ModuleId),

    /// The module exists but has no port with this index or name.
    #[error("module {module} has no {direction} port {name}")]
    PortNotFound {
        /// Module searched.
        module: ModuleId,
        /// Direction searched.
        direction: Direction,
        /// Port name, or `#index` when looked up by index.
        name: PortName,
    },

    /// The specified link was not found in the graph.
    #[error("link {0} not found")]
    LinkNotFound(LinkId),

    /// A module declares more ports than a [`PortMask`](crate::PortMask) holds.
    #[error("module kind '{kind}' declares {count} ports (max {max})", max = crate::MAX_PORTS)]
    TooManyPorts {
        /// Module kind name.
        kind: &'static str,
        /// Number of ports declared.
        count: usize,
    },

    /// The graph has no modules.
    #[error("graph has no modules")]
    EmptyGraph,
}

/// How a missing port was asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortName {
    /// Looked up by name.
    Named(String),
    /// Looked up by index.
    Index(u16),
}

impl core::fmt::Display for PortName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Named(name) => write!(f, "'{name}'"),
            Self::Index(index) => write!(f, "#{index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_display() {
        let err = GraphError::TypeMismatch {
            port: PortRef::new(ModuleId(1), 0),
            expected: ElementType::F32,
            found: ElementType::I32,
        };
        assert_eq!(
            err.to_string(),
            "type mismatch at port ModuleId(1):0: link expects f32, port holds i32"
        );
    }

    #[test]
    fn test_cycle_display() {
        let err = GraphError::CycleDetected {
            module: ModuleId(4),
        };
        assert_eq!(err.to_string(), "module graph has a cycle through ModuleId(4)");
    }

    #[test]
    fn test_port_not_found_display() {
        let err = GraphError::PortNotFound {
            module: ModuleId(0),
            direction: Direction::Output,
            name: PortName::Index(3),
        };
        assert_eq!(err.to_string(), "module ModuleId(0) has no output port #3");
    }

    #[test]
    fn test_too_many_ports_display() {
        let err = GraphError::TooManyPorts {
            kind: "bus",
            count: 65,
        };
        assert_eq!(err.to_string(), "module kind 'bus' declares 65 ports (max 64)");
    }
}
