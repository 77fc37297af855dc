//! Visibility resolution and per-resource guards

pub mod guard;
pub mod resolver;

pub use guard::{
    extract_owner_actor_id, GuardedData, GuardedResource, LookupBy, ResourceGuard,
    VisibilitySource,
};
pub use resolver::{
    decide, needs_relationship, ActorRole, Decision, RelationshipLookup, RelationshipState,
    ResourceKind, VisibilityResolver, VisibilitySetting,
};
