//! Koinonia - relationship lifecycle and visibility authorization engine
//!
//! "That they all may be one" - John 17:21
//!
//! Koinonia is the authorization core of a social platform backend: the state
//! machine governing bidirectional connection requests between two actors,
//! the per-actor activity counters kept transactionally consistent with
//! relationship state, and the visibility resolution that decides whether one
//! actor may view another's resources.
//!
//! ## Components
//!
//! - **Relationship service**: create/transition/delete connection rows with
//!   counter bookkeeping inside one MongoDB transaction
//! - **Transition table**: exhaustive enum-matched state machine for the
//!   status and block dimensions
//! - **Visibility resolver**: pure decision function over role, ownership,
//!   relationship state, and the owner's visibility setting
//! - **Resource guard**: per-resource adapter that loads a document and
//!   delegates the allow/deny decision to the resolver
//!
//! The HTTP/GraphQL request layer, field validation, and single-entity CRUD
//! live upstream; this crate trusts the caller identity it is handed.

pub mod config;
pub mod db;
pub mod logging;
pub mod relationship;
pub mod types;
pub mod visibility;

pub use config::Args;
pub use relationship::{RelationshipService, RequestedStatus};
pub use types::{ApiOutcome, KoinoniaError, Result, StatusKind};
pub use visibility::{ResourceGuard, VisibilityResolver};
