use crate::cell::CellId;
use crate::coordinate::CoordRef;
use crate::dep_graph::CycleError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LayoutError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("unknown cell: {cell}")]
    UnknownCell { cell: CellId },

    #[error("child index {index} out of range for {parent} with {len} children")]
    IndexOutOfRange {
        parent: CellId,
        index: usize,
        len: usize,
    },

    #[error("cannot attach {cell} under {parent}: {parent} is {cell} or one of its descendants")]
    InvalidParent { cell: CellId, parent: CellId },

    #[error("cannot seed {cell}: it has a parent")]
    NotRoot { cell: CellId },

    #[error("dependency cycle: {dependent} would read {prerequisite}")]
    Cycle {
        dependent: CoordRef,
        prerequisite: CoordRef,
    },
}

impl From<CycleError> for LayoutError {
    fn from(err: CycleError) -> Self {
        Self::Cycle {
            dependent: CoordRef::from_node(err.from),
            prerequisite: CoordRef::from_node(err.to),
        }
    }
}
