//! `depot-auth` — authorization input for the engine's entry points.
//!
//! The engine trusts an already-authenticated principal and its capability
//! set; credential issuance and token validation live with an external
//! collaborator.

pub mod capability;
pub mod permissions;
pub mod principal;

pub use capability::CapabilitySet;
pub use permissions::Permission;
pub use principal::{Principal, PrincipalId};
