//! Relationship lifecycle: transition table and service

pub mod service;
pub mod transition;

pub use service::{Page, RelationshipFilter, RelationshipService, RelationshipSnapshot};
pub use transition::{
    resolve_block_transition, resolve_status_transition, CounterDelta, DeltaTarget,
    RequestedStatus, RowEffect, TransitionKind, TransitionPlan, UpdateDimension,
};
