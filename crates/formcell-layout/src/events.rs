#![forbid(unsafe_code)]

//! Change notifications published by [`CellLayout`](crate::CellLayout).
//!
//! # Design
//!
//! The layout owns a single [`Subscribers`] registry. Every mutation that
//! changes observable state publishes one [`LayoutEvent`] per change, and
//! handlers run synchronously, in registration order, before the mutating
//! call returns.
//!
//! Handlers receive the event by reference and cannot reach back into the
//! layout; a handler that needs layout state records the event and reads
//! the layout after the call returns.
//!
//! | Event | Published when |
//! |-------|----------------|
//! | `CellCreated` / `CellRemoved` | arena slot filled / freed |
//! | `ParentChanged` | a cell is attached, detached or reparented |
//! | `ChildrenChanged` | a cell's ordered child list changes |
//! | `TareChanged` | a coordinate's tare changes value |
//! | `RelativeValueChanged` / `AbsoluteValueChanged` | a resolved value changes |
//! | `CalculationChanged` | a coordinate's rule is replaced |
//! | `Invalidated` | a rule is edited in place |
//! | `PrerequisiteAdded` / `PrerequisiteRemoved` | the edge set changes |

use crate::cell::CellId;
use crate::coordinate::CoordRef;
use std::fmt;

/// One observable change.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutEvent {
    CellCreated {
        cell: CellId,
    },
    CellRemoved {
        cell: CellId,
    },
    ParentChanged {
        cell: CellId,
        old: Option<CellId>,
        new: Option<CellId>,
    },
    ChildrenChanged {
        cell: CellId,
    },
    TareChanged {
        coord: CoordRef,
        old: Option<f32>,
        new: Option<f32>,
    },
    RelativeValueChanged {
        coord: CoordRef,
        old: Option<f32>,
        new: Option<f32>,
    },
    AbsoluteValueChanged {
        coord: CoordRef,
        old: Option<f32>,
        new: Option<f32>,
    },
    CalculationChanged {
        coord: CoordRef,
    },
    Invalidated {
        coord: CoordRef,
    },
    PrerequisiteAdded {
        dependent: CoordRef,
        prerequisite: CoordRef,
    },
    PrerequisiteRemoved {
        dependent: CoordRef,
        prerequisite: CoordRef,
    },
}

impl LayoutEvent {
    /// The cell this event is about.
    ///
    /// For edge events this is the dependent's cell.
    #[must_use]
    pub fn cell(&self) -> CellId {
        match self {
            Self::CellCreated { cell }
            | Self::CellRemoved { cell }
            | Self::ParentChanged { cell, .. }
            | Self::ChildrenChanged { cell } => *cell,
            Self::TareChanged { coord, .. }
            | Self::RelativeValueChanged { coord, .. }
            | Self::AbsoluteValueChanged { coord, .. }
            | Self::CalculationChanged { coord }
            | Self::Invalidated { coord } => coord.cell,
            Self::PrerequisiteAdded { dependent, .. }
            | Self::PrerequisiteRemoved { dependent, .. } => dependent.cell,
        }
    }
}

/// Handle returned by [`Subscribers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

type Handler = Box<dyn FnMut(&LayoutEvent)>;

/// Ordered registry of event handlers.
#[derive(Default)]
pub struct Subscribers {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler)>,
}

impl Subscribers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`; it sees every event published from now on.
    pub fn subscribe(&mut self, handler: impl FnMut(&LayoutEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Drop a handler. Returns `false` if `id` was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(sid, _)| *sid != id);
        self.handlers.len() != before
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Deliver `event` to every handler in registration order.
    pub fn publish(&mut self, event: &LayoutEvent) {
        for (_, handler) in &mut self.handlers {
            handler(event);
        }
    }
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.handlers.len())
            .finish_non_exhaustive()
    }
}
