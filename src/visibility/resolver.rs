//! Visibility resolution
//!
//! Decides whether a viewer may see a resource owned by another actor, from
//! role, ownership, relationship state, and the owner's visibility setting.
//!
//! The decision itself is a pure function over already-fetched relationship
//! state; `VisibilityResolver` wraps it with the single relationship lookup
//! the `connection` setting needs. Nothing here mutates state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::db::schemas::{BlockStatus, ConnectionStatus, RelationshipDoc};
use crate::relationship::RelationshipService;
use crate::types::Result;

/// Role of the viewing actor, as established by the upstream request layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActorRole {
    #[default]
    Member = 0,
    Admin = 1,
}

impl ActorRole {
    /// Elevated roles bypass all visibility rules
    pub fn is_elevated(&self) -> bool {
        *self >= ActorRole::Admin
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Member => write!(f, "MEMBER"),
            ActorRole::Admin => write!(f, "ADMIN"),
        }
    }
}

/// Per-actor visibility setting, owned by profile management. Unrecognized
/// stored values deserialize to `Unknown` and are denied as a data-integrity
/// fault rather than silently allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum VisibilitySetting {
    #[default]
    Public,
    Private,
    Connection,
    #[serde(other)]
    Unknown,
}

/// Families of visibility-gated resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Profile,
    Address,
    Education,
    Experience,
    Post,
    Connection,
}

impl ResourceKind {
    /// Resource kinds a pending (not yet accepted) connection may see.
    /// Parties need to see the request itself to act on it.
    pub fn visible_before_acceptance(&self) -> bool {
        matches!(self, ResourceKind::Connection)
    }
}

/// Relationship state as the decision function consumes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipState {
    pub initiator_id: String,
    pub recipient_id: String,
    pub status: ConnectionStatus,
    pub block_status: BlockStatus,
}

impl RelationshipState {
    /// Whether the given actor is a party to this relationship
    pub fn involves(&self, actor_id: &str) -> bool {
        self.initiator_id == actor_id || self.recipient_id == actor_id
    }
}

impl From<&RelationshipDoc> for RelationshipState {
    fn from(row: &RelationshipDoc) -> Self {
        Self {
            initiator_id: row.initiator_id.clone(),
            recipient_id: row.recipient_id.clone(),
            status: row.status,
            block_status: row.block_status,
        }
    }
}

/// Outcome of a visibility decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { reason: String },
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    fn deny(reason: &str) -> Self {
        Decision::Deny {
            reason: reason.to_string(),
        }
    }
}

/// Whether `decide` will need the viewer/owner relationship for these inputs.
/// Lets the resolver skip the lookup on the short-circuiting branches.
pub fn needs_relationship(
    viewer_id: &str,
    viewer_role: ActorRole,
    owner_id: &str,
    setting: VisibilitySetting,
    kind: ResourceKind,
) -> bool {
    if viewer_role.is_elevated() || viewer_id == owner_id {
        return false;
    }
    kind == ResourceKind::Connection || setting == VisibilitySetting::Connection
}

/// Pure visibility decision, short-circuiting on first match:
/// elevated role, self-access, party-to-the-relationship-resource, then the
/// owner's visibility setting.
pub fn decide(
    viewer_id: &str,
    viewer_role: ActorRole,
    owner_id: &str,
    setting: VisibilitySetting,
    kind: ResourceKind,
    relationship: Option<&RelationshipState>,
) -> Decision {
    if viewer_role.is_elevated() {
        return Decision::Allow;
    }

    if viewer_id == owner_id {
        return Decision::Allow;
    }

    // Parties can always see their own relationship row regardless of state
    if kind == ResourceKind::Connection
        && relationship.is_some_and(|r| r.involves(viewer_id) && r.involves(owner_id))
    {
        return Decision::Allow;
    }

    match setting {
        VisibilitySetting::Public => Decision::Allow,
        VisibilitySetting::Private => Decision::deny("profile is private"),
        VisibilitySetting::Connection => match relationship {
            None => Decision::deny("only connections can view this profile"),
            Some(r) if r.block_status == BlockStatus::Blocked => {
                Decision::deny("you are blocked by this user")
            }
            Some(r) if r.status == ConnectionStatus::Pending => {
                if kind.visible_before_acceptance() {
                    Decision::Allow
                } else {
                    Decision::deny("not yet connected")
                }
            }
            Some(_) => Decision::Allow,
        },
        VisibilitySetting::Unknown => Decision::deny("invalid visibility configuration"),
    }
}

/// Read-only port for fetching the relationship between two actors
#[async_trait]
pub trait RelationshipLookup: Send + Sync {
    /// The relationship between the two actors, in either creation order
    async fn find_between(&self, a: &str, b: &str) -> Result<Option<RelationshipState>>;
}

#[async_trait]
impl RelationshipLookup for RelationshipService {
    async fn find_between(&self, a: &str, b: &str) -> Result<Option<RelationshipState>> {
        Ok(RelationshipService::find_between(self, a, b)
            .await?
            .as_ref()
            .map(RelationshipState::from))
    }
}

/// Visibility resolver: fetches relationship state when the decision needs
/// it, then delegates to the pure decision function
#[derive(Clone)]
pub struct VisibilityResolver {
    lookup: Arc<dyn RelationshipLookup>,
}

impl VisibilityResolver {
    pub fn new(lookup: Arc<dyn RelationshipLookup>) -> Self {
        Self { lookup }
    }

    /// Resolve a visibility decision, performing at most one relationship
    /// lookup and never mutating state
    pub async fn resolve(
        &self,
        viewer_id: &str,
        viewer_role: ActorRole,
        owner_id: &str,
        setting: VisibilitySetting,
        kind: ResourceKind,
    ) -> Result<Decision> {
        let relationship =
            if needs_relationship(viewer_id, viewer_role, owner_id, setting, kind) {
                self.lookup.find_between(viewer_id, owner_id).await?
            } else {
                None
            };

        let decision = decide(
            viewer_id,
            viewer_role,
            owner_id,
            setting,
            kind,
            relationship.as_ref(),
        );

        debug!(
            viewer = viewer_id,
            owner = owner_id,
            setting = ?setting,
            kind = ?kind,
            allowed = decision.is_allow(),
            "visibility resolved"
        );

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(status: ConnectionStatus, block_status: BlockStatus) -> RelationshipState {
        RelationshipState {
            initiator_id: "alice".into(),
            recipient_id: "bob".into(),
            status,
            block_status,
        }
    }

    #[test]
    fn test_elevated_role_always_allowed() {
        let d = decide(
            "viewer",
            ActorRole::Admin,
            "owner",
            VisibilitySetting::Private,
            ResourceKind::Address,
            None,
        );
        assert!(d.is_allow());
    }

    #[test]
    fn test_self_access_allowed() {
        let d = decide(
            "alice",
            ActorRole::Member,
            "alice",
            VisibilitySetting::Private,
            ResourceKind::Education,
            None,
        );
        assert!(d.is_allow());
    }

    #[test]
    fn test_public_allowed_for_stranger() {
        let d = decide(
            "viewer",
            ActorRole::Member,
            "owner",
            VisibilitySetting::Public,
            ResourceKind::Post,
            None,
        );
        assert!(d.is_allow());
    }

    #[test]
    fn test_private_denies_everyone_even_accepted_connections() {
        let r = rel(ConnectionStatus::Accepted, BlockStatus::UnBlocked);
        let d = decide(
            "bob",
            ActorRole::Member,
            "alice",
            VisibilitySetting::Private,
            ResourceKind::Profile,
            Some(&r),
        );
        assert_eq!(d, Decision::deny("profile is private"));
    }

    #[test]
    fn test_connection_without_relationship_denied() {
        let d = decide(
            "viewer",
            ActorRole::Member,
            "owner",
            VisibilitySetting::Connection,
            ResourceKind::Profile,
            None,
        );
        assert_eq!(d, Decision::deny("only connections can view this profile"));
    }

    #[test]
    fn test_blocked_relationship_denied() {
        let r = rel(ConnectionStatus::Accepted, BlockStatus::Blocked);
        let d = decide(
            "bob",
            ActorRole::Member,
            "alice",
            VisibilitySetting::Connection,
            ResourceKind::Profile,
            Some(&r),
        );
        assert_eq!(d, Decision::deny("you are blocked by this user"));
    }

    #[test]
    fn test_pending_relationship_denied_except_allow_listed_kinds() {
        let r = rel(ConnectionStatus::Pending, BlockStatus::UnBlocked);
        let denied = decide(
            "bob",
            ActorRole::Member,
            "alice",
            VisibilitySetting::Connection,
            ResourceKind::Education,
            Some(&r),
        );
        assert_eq!(denied, Decision::deny("not yet connected"));

        let allowed = decide(
            "bob",
            ActorRole::Member,
            "alice",
            VisibilitySetting::Connection,
            ResourceKind::Connection,
            Some(&r),
        );
        assert!(allowed.is_allow());
    }

    #[test]
    fn test_accepted_unblocked_allowed() {
        let r = rel(ConnectionStatus::Accepted, BlockStatus::UnBlocked);
        let d = decide(
            "bob",
            ActorRole::Member,
            "alice",
            VisibilitySetting::Connection,
            ResourceKind::Experience,
            Some(&r),
        );
        assert!(d.is_allow());
    }

    #[test]
    fn test_party_sees_own_relationship_row_regardless_of_setting() {
        let r = rel(ConnectionStatus::Pending, BlockStatus::Blocked);
        let d = decide(
            "bob",
            ActorRole::Member,
            "alice",
            VisibilitySetting::Private,
            ResourceKind::Connection,
            Some(&r),
        );
        assert!(d.is_allow());
    }

    #[test]
    fn test_unknown_setting_denied() {
        let d = decide(
            "viewer",
            ActorRole::Member,
            "owner",
            VisibilitySetting::Unknown,
            ResourceKind::Profile,
            None,
        );
        assert_eq!(d, Decision::deny("invalid visibility configuration"));
    }

    #[test]
    fn test_unknown_setting_deserializes_from_bad_data() {
        let setting: VisibilitySetting = serde_json::from_str("\"friendsOnly\"").unwrap();
        assert_eq!(setting, VisibilitySetting::Unknown);
    }

    #[test]
    fn test_needs_relationship_short_circuits() {
        assert!(!needs_relationship(
            "a",
            ActorRole::Admin,
            "b",
            VisibilitySetting::Connection,
            ResourceKind::Profile
        ));
        assert!(!needs_relationship(
            "a",
            ActorRole::Member,
            "a",
            VisibilitySetting::Connection,
            ResourceKind::Profile
        ));
        assert!(!needs_relationship(
            "a",
            ActorRole::Member,
            "b",
            VisibilitySetting::Public,
            ResourceKind::Profile
        ));
        assert!(needs_relationship(
            "a",
            ActorRole::Member,
            "b",
            VisibilitySetting::Connection,
            ResourceKind::Profile
        ));
        assert!(needs_relationship(
            "a",
            ActorRole::Member,
            "b",
            VisibilitySetting::Public,
            ResourceKind::Connection
        ));
    }

    struct FakeLookup {
        state: Option<RelationshipState>,
    }

    #[async_trait]
    impl RelationshipLookup for FakeLookup {
        async fn find_between(&self, _a: &str, _b: &str) -> Result<Option<RelationshipState>> {
            Ok(self.state.clone())
        }
    }

    #[tokio::test]
    async fn test_resolver_fetches_only_when_needed() {
        let resolver = VisibilityResolver::new(Arc::new(FakeLookup {
            state: Some(rel(ConnectionStatus::Accepted, BlockStatus::UnBlocked)),
        }));

        let d = resolver
            .resolve(
                "bob",
                ActorRole::Member,
                "alice",
                VisibilitySetting::Connection,
                ResourceKind::Experience,
            )
            .await
            .unwrap();
        assert!(d.is_allow());

        let resolver = VisibilityResolver::new(Arc::new(FakeLookup { state: None }));
        let d = resolver
            .resolve(
                "viewer",
                ActorRole::Member,
                "owner",
                VisibilitySetting::Connection,
                ResourceKind::Profile,
            )
            .await
            .unwrap();
        assert_eq!(d, Decision::deny("only connections can view this profile"));
    }
}
