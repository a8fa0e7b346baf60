//! Request authorization and credential handling, transport-agnostic.
//!
//! The gate sits in front of resource handlers: a transport layer builds a
//! [`RequestDescriptor`] and the gate authenticates the caller, evaluates
//! policy and records the outcome before any handler logic runs.
//!
//! ```no_run
//! use authgate::{AppState, Config, CredentialPresentation, RequestDescriptor, Action};
//!
//! # async fn demo() -> Result<(), authgate::AuthError> {
//! let config = Config::from_env()?;
//! let state = AppState::from_config(&config)?;
//!
//! let alice = state
//!     .credentials
//!     .register("alice", "Str0ng!Pass", "a@x.com")
//!     .await?;
//! let session = state.gate.login("alice", "Str0ng!Pass", None).await?;
//!
//! let outcome = state
//!     .gate
//!     .handle(RequestDescriptor {
//!         credential: CredentialPresentation::Bearer(session.token),
//!         resource_id: "doc-1".to_string(),
//!         action: Action::Read,
//!         source: None,
//!     })
//!     .await;
//! # let _ = (alice, outcome);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod repos;
pub mod services;
pub mod state;

pub use config::{Config, ConfigError};
pub use error::AuthError;
pub use repos::principal_repo::{
    InMemoryPrincipalRepo, Principal, PrincipalRepo, PrincipalStatus, Role,
};
pub use repos::resource_repo::{
    InMemoryResourceRepo, Resource, ResourceId, ResourceRepo, Visibility,
};
pub use services::audit::{AuditEntry, AuditOutcome, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use services::credential::{CredentialService, PasswordPolicy};
pub use services::gate::{
    CredentialPresentation, GateOutcome, IssuedSession, RequestDescriptor, RequestGate, Subject,
};
pub use services::policy::{Action, AdminAction, Decision, PolicyEngine, RoleGrants};
pub use services::rate_limit::{AuthRateLimiter, RateLimitConfig};
pub use services::token::{IssuedToken, TokenCodec, TokenIdentity};
pub use services::validate;
pub use state::AppState;
