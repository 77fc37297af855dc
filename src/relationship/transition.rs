//! Relationship state-transition table
//!
//! Pure lookup from (current state, requested state) to a transition plan:
//! the row effect, the counter deltas to apply, and the validation predicate
//! that gates who may perform the transition. Undefined and same-state
//! transitions are conflicts; no mutation happens for them.
//!
//! The two dimensions (connection status, block status) are resolved
//! separately; the service consults the status dimension first.

use serde::{Deserialize, Serialize};

use crate::db::schemas::{BlockStatus, ConnectionStatus, CounterField, RelationshipDoc};
use crate::types::{KoinoniaError, Result};

/// Status an update request may ask for. `Unfriend` is a request-only state:
/// it deletes the row rather than being stored.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RequestedStatus {
    Pending,
    Accepted,
    Unfriend,
}

/// The single dimension an update request addresses. A request carrying both
/// a status and a block-status value is ambiguous and rejected outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDimension {
    NoChange,
    Status(RequestedStatus),
    Block(BlockStatus),
}

impl UpdateDimension {
    /// Classify an update request by the dimension it touches
    pub fn from_request(
        new_status: Option<RequestedStatus>,
        new_block_status: Option<BlockStatus>,
    ) -> Result<Self> {
        match (new_status, new_block_status) {
            (Some(_), Some(_)) => Err(KoinoniaError::BadRequest(
                "update either the connection status or the block status, not both".to_string(),
            )),
            (Some(requested), None) => Ok(Self::Status(requested)),
            (None, Some(requested)) => Ok(Self::Block(requested)),
            (None, None) => Ok(Self::NoChange),
        }
    }
}

/// Which actor's counter aggregate a delta applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaTarget {
    /// The initiator of the relationship row
    Initiator,
    /// Both parties of the relationship row
    BothActors,
    /// The actor performing this transition
    ActingActor,
}

/// A single counter adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterDelta {
    pub field: CounterField,
    pub delta: i64,
    pub target: DeltaTarget,
}

/// What happens to the relationship row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowEffect {
    /// Conditional `$set` of the changed dimension(s)
    Update {
        status: Option<ConnectionStatus>,
        block_status: Option<BlockStatus>,
    },
    /// Row is removed entirely
    Delete,
}

/// The transition being performed, used by the validation predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Accept,
    Unfriend,
    Block,
    Unblock,
}

/// Resolved transition: row effect plus counter-delta plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub kind: TransitionKind,
    pub effect: RowEffect,
    pub deltas: Vec<CounterDelta>,
}

impl TransitionPlan {
    /// Validation predicate: rejects transitions the acting actor is not
    /// entitled to perform. Runs after resolution, before any mutation.
    pub fn validate(&self, acting_actor_id: &str, row: &RelationshipDoc) -> Result<()> {
        if !row.involves(acting_actor_id) {
            return Err(KoinoniaError::Forbidden(
                "you are not a party to this relationship".to_string(),
            ));
        }

        match self.kind {
            TransitionKind::Accept => {
                // An actor cannot accept their own request
                if acting_actor_id == row.initiator_id {
                    return Err(KoinoniaError::Conflict(
                        "you cannot accept your own connection request".to_string(),
                    ));
                }
                Ok(())
            }
            TransitionKind::Unfriend => Ok(()),
            // Re-blocking is already a same-state conflict at resolution time
            TransitionKind::Block => Ok(()),
            TransitionKind::Unblock => {
                // Only the actor who imposed the block may lift it
                if row.history.actor_who_acted != acting_actor_id {
                    return Err(KoinoniaError::Conflict(
                        "you cannot unblock a user you did not block".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Resolve a transition on the connection-status dimension
pub fn resolve_status_transition(
    current: ConnectionStatus,
    requested: RequestedStatus,
) -> Result<TransitionPlan> {
    use ConnectionStatus::*;
    use RequestedStatus as Req;

    match (current, requested) {
        (Pending, Req::Accepted) => Ok(TransitionPlan {
            kind: TransitionKind::Accept,
            effect: RowEffect::Update {
                status: Some(Accepted),
                block_status: None,
            },
            // Pending is only ever counted on the initiator
            deltas: vec![
                CounterDelta {
                    field: CounterField::Pending,
                    delta: -1,
                    target: DeltaTarget::Initiator,
                },
                CounterDelta {
                    field: CounterField::Accepted,
                    delta: 1,
                    target: DeltaTarget::BothActors,
                },
            ],
        }),
        (Accepted, Req::Unfriend) => Ok(TransitionPlan {
            kind: TransitionKind::Unfriend,
            effect: RowEffect::Delete,
            deltas: vec![CounterDelta {
                field: CounterField::Accepted,
                delta: -1,
                target: DeltaTarget::BothActors,
            }],
        }),
        (Pending, Req::Pending) => Err(KoinoniaError::Conflict(
            "connection request is already pending".to_string(),
        )),
        (Pending, Req::Unfriend) => Err(KoinoniaError::Conflict(
            "cannot unfriend a connection that was never accepted".to_string(),
        )),
        (Accepted, Req::Accepted) => Err(KoinoniaError::Conflict(
            "connection is already accepted".to_string(),
        )),
        (Accepted, Req::Pending) => Err(KoinoniaError::Conflict(
            "an accepted connection cannot return to pending".to_string(),
        )),
    }
}

/// Resolve a transition on the block-status dimension. The current connection
/// status decides whether an unblock deletes the row outright.
pub fn resolve_block_transition(
    current: BlockStatus,
    requested: BlockStatus,
    status: ConnectionStatus,
) -> Result<TransitionPlan> {
    use BlockStatus::*;

    match (current, requested) {
        (UnBlocked, Blocked) => Ok(TransitionPlan {
            kind: TransitionKind::Block,
            effect: RowEffect::Update {
                status: None,
                block_status: Some(Blocked),
            },
            deltas: vec![CounterDelta {
                field: CounterField::Blocked,
                delta: 1,
                target: DeltaTarget::ActingActor,
            }],
        }),
        (Blocked, UnBlocked) => {
            if status == ConnectionStatus::Pending {
                // Unblocking a still-pending request dissolves it entirely;
                // the initiator's pending count is released with it
                Ok(TransitionPlan {
                    kind: TransitionKind::Unblock,
                    effect: RowEffect::Delete,
                    deltas: vec![
                        CounterDelta {
                            field: CounterField::Blocked,
                            delta: -1,
                            target: DeltaTarget::ActingActor,
                        },
                        CounterDelta {
                            field: CounterField::Pending,
                            delta: -1,
                            target: DeltaTarget::Initiator,
                        },
                    ],
                })
            } else {
                Ok(TransitionPlan {
                    kind: TransitionKind::Unblock,
                    effect: RowEffect::Update {
                        status: None,
                        block_status: Some(UnBlocked),
                    },
                    deltas: vec![CounterDelta {
                        field: CounterField::Blocked,
                        delta: -1,
                        target: DeltaTarget::ActingActor,
                    }],
                })
            }
        }
        (Blocked, Blocked) => Err(KoinoniaError::Conflict(
            "user is already blocked".to_string(),
        )),
        (UnBlocked, UnBlocked) => Err(KoinoniaError::Conflict(
            "user is not blocked".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::RelationshipHistory;

    fn row(
        status: ConnectionStatus,
        block_status: BlockStatus,
        last_actor: &str,
    ) -> RelationshipDoc {
        let mut r = RelationshipDoc::new("alice".into(), "bob".into(), block_status);
        r.status = status;
        r.history = RelationshipHistory::record(last_actor, block_status);
        r
    }

    #[test]
    fn test_accept_plan() {
        let plan =
            resolve_status_transition(ConnectionStatus::Pending, RequestedStatus::Accepted)
                .unwrap();
        assert_eq!(plan.kind, TransitionKind::Accept);
        assert_eq!(
            plan.effect,
            RowEffect::Update {
                status: Some(ConnectionStatus::Accepted),
                block_status: None
            }
        );
        assert_eq!(plan.deltas.len(), 2);
        assert_eq!(plan.deltas[0].field, CounterField::Pending);
        assert_eq!(plan.deltas[0].delta, -1);
        assert_eq!(plan.deltas[0].target, DeltaTarget::Initiator);
        assert_eq!(plan.deltas[1].field, CounterField::Accepted);
        assert_eq!(plan.deltas[1].delta, 1);
        assert_eq!(plan.deltas[1].target, DeltaTarget::BothActors);
    }

    #[test]
    fn test_unfriend_plan_deletes_row() {
        let plan =
            resolve_status_transition(ConnectionStatus::Accepted, RequestedStatus::Unfriend)
                .unwrap();
        assert_eq!(plan.kind, TransitionKind::Unfriend);
        assert_eq!(plan.effect, RowEffect::Delete);
        assert_eq!(
            plan.deltas,
            vec![CounterDelta {
                field: CounterField::Accepted,
                delta: -1,
                target: DeltaTarget::BothActors
            }]
        );
    }

    #[test]
    fn test_invalid_status_transitions_conflict() {
        for (current, requested) in [
            (ConnectionStatus::Pending, RequestedStatus::Pending),
            (ConnectionStatus::Pending, RequestedStatus::Unfriend),
            (ConnectionStatus::Accepted, RequestedStatus::Accepted),
            (ConnectionStatus::Accepted, RequestedStatus::Pending),
        ] {
            let err = resolve_status_transition(current, requested).unwrap_err();
            assert!(
                matches!(err, KoinoniaError::Conflict(_)),
                "{:?}->{:?} should conflict",
                current,
                requested
            );
        }
    }

    #[test]
    fn test_block_plan() {
        let plan = resolve_block_transition(
            BlockStatus::UnBlocked,
            BlockStatus::Blocked,
            ConnectionStatus::Accepted,
        )
        .unwrap();
        assert_eq!(plan.kind, TransitionKind::Block);
        assert_eq!(
            plan.deltas,
            vec![CounterDelta {
                field: CounterField::Blocked,
                delta: 1,
                target: DeltaTarget::ActingActor
            }]
        );
    }

    #[test]
    fn test_unblock_keeps_accepted_row() {
        let plan = resolve_block_transition(
            BlockStatus::Blocked,
            BlockStatus::UnBlocked,
            ConnectionStatus::Accepted,
        )
        .unwrap();
        assert_eq!(
            plan.effect,
            RowEffect::Update {
                status: None,
                block_status: Some(BlockStatus::UnBlocked)
            }
        );
        assert_eq!(plan.deltas.len(), 1);
    }

    #[test]
    fn test_unblock_while_pending_deletes_row_and_releases_pending() {
        let plan = resolve_block_transition(
            BlockStatus::Blocked,
            BlockStatus::UnBlocked,
            ConnectionStatus::Pending,
        )
        .unwrap();
        assert_eq!(plan.effect, RowEffect::Delete);
        assert!(plan.deltas.contains(&CounterDelta {
            field: CounterField::Blocked,
            delta: -1,
            target: DeltaTarget::ActingActor
        }));
        assert!(plan.deltas.contains(&CounterDelta {
            field: CounterField::Pending,
            delta: -1,
            target: DeltaTarget::Initiator
        }));
    }

    #[test]
    fn test_same_state_block_transitions_conflict() {
        for (current, requested) in [
            (BlockStatus::Blocked, BlockStatus::Blocked),
            (BlockStatus::UnBlocked, BlockStatus::UnBlocked),
        ] {
            let err =
                resolve_block_transition(current, requested, ConnectionStatus::Accepted)
                    .unwrap_err();
            assert!(matches!(err, KoinoniaError::Conflict(_)));
        }
    }

    #[test]
    fn test_initiator_cannot_accept_own_request() {
        let plan =
            resolve_status_transition(ConnectionStatus::Pending, RequestedStatus::Accepted)
                .unwrap();
        let r = row(ConnectionStatus::Pending, BlockStatus::UnBlocked, "alice");
        let err = plan.validate("alice", &r).unwrap_err();
        assert!(matches!(err, KoinoniaError::Conflict(_)));
        assert!(plan.validate("bob", &r).is_ok());
    }

    #[test]
    fn test_only_blocker_may_unblock() {
        let plan = resolve_block_transition(
            BlockStatus::Blocked,
            BlockStatus::UnBlocked,
            ConnectionStatus::Accepted,
        )
        .unwrap();
        let r = row(ConnectionStatus::Accepted, BlockStatus::Blocked, "alice");
        let err = plan.validate("bob", &r).unwrap_err();
        match err {
            KoinoniaError::Conflict(reason) => {
                assert!(reason.contains("did not block"));
            }
            other => panic!("expected Conflict, got {:?}", other),
        }
        assert!(plan.validate("alice", &r).is_ok());
    }

    #[test]
    fn test_non_party_rejected() {
        let plan =
            resolve_status_transition(ConnectionStatus::Pending, RequestedStatus::Accepted)
                .unwrap();
        let r = row(ConnectionStatus::Pending, BlockStatus::UnBlocked, "alice");
        let err = plan.validate("carol", &r).unwrap_err();
        assert!(matches!(err, KoinoniaError::Forbidden(_)));
    }

    #[test]
    fn test_dual_dimension_update_rejected() {
        let err = UpdateDimension::from_request(
            Some(RequestedStatus::Accepted),
            Some(BlockStatus::Blocked),
        )
        .unwrap_err();
        assert!(matches!(err, KoinoniaError::BadRequest(_)));
    }

    #[test]
    fn test_single_dimension_requests_classified() {
        assert_eq!(
            UpdateDimension::from_request(Some(RequestedStatus::Unfriend), None).unwrap(),
            UpdateDimension::Status(RequestedStatus::Unfriend)
        );
        assert_eq!(
            UpdateDimension::from_request(None, Some(BlockStatus::UnBlocked)).unwrap(),
            UpdateDimension::Block(BlockStatus::UnBlocked)
        );
        assert_eq!(
            UpdateDimension::from_request(None, None).unwrap(),
            UpdateDimension::NoChange
        );
    }

    #[test]
    fn test_validate_is_idempotent_on_rejection() {
        // Repeating an invalid transition keeps conflicting without mutation
        for _ in 0..2 {
            let err = resolve_status_transition(
                ConnectionStatus::Accepted,
                RequestedStatus::Accepted,
            )
            .unwrap_err();
            assert!(matches!(err, KoinoniaError::Conflict(_)));
        }
    }
}
