//! Request gate: the single entry point deciding whether a request may
//! proceed.
//!
//! Every request moves through the same states:
//!
//! `Unauthenticated -> Authenticating -> {Authenticated | AuthFailed}
//!                  -> Authorizing -> {Admitted | Denied}`
//!
//! Properties the gate enforces:
//! - no implicit principal: a missing credential authenticates as
//!   anonymous, a *failing* credential rejects; nothing ever falls back to
//!   a privileged identity
//! - external identifiers are validated against the allow-list before any
//!   store is consulted
//! - authentication attempts are rate limited per subject and per source,
//!   and lockout wins over credential correctness
//! - every outcome, admit or reject, is recorded through the audit sink
//! - any internal failure maps to a rejection; there is no fail-open path

use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use crate::error::AuthError;
use crate::repos::principal_repo::{Principal, PrincipalRepo};
use crate::repos::resource_repo::ResourceRepo;
use crate::services::audit::{AuditEntry, AuditOutcome, AuditSink};
use crate::services::credential::CredentialService;
use crate::services::policy::{Action, AdminAction, Decision, PolicyEngine};
use crate::services::rate_limit::AuthRateLimiter;
use crate::services::token::{self, TokenCodec};
use crate::services::validate;

/// How the caller identifies itself.
#[derive(Clone)]
pub enum CredentialPresentation {
    Bearer(String),
    Password { username: String, password: String },
    Anonymous,
}

impl std::fmt::Debug for CredentialPresentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print tokens or passwords
        match self {
            CredentialPresentation::Bearer(_) => f.write_str("Bearer(REDACTED)"),
            CredentialPresentation::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"REDACTED")
                .finish(),
            CredentialPresentation::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// Transport-agnostic request descriptor. The transport layer fills this
/// in; nothing else crosses the boundary.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub credential: CredentialPresentation,
    pub resource_id: String,
    pub action: Action,
    /// Opaque source key (e.g. a client address) for rate limiting.
    pub source: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Subject {
    Anonymous,
    Principal(Principal),
}

impl Subject {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Subject::Anonymous => None,
            Subject::Principal(p) => Some(p),
        }
    }

    fn audit_id(&self) -> String {
        match self {
            Subject::Anonymous => "anonymous".to_string(),
            Subject::Principal(p) => p.id.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum GateOutcome {
    Admitted {
        subject: Subject,
        reason: &'static str,
    },
    Rejected {
        error: AuthError,
    },
}

impl GateOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, GateOutcome::Admitted { .. })
    }
}

/// A successful login: the issued session token plus the principal it
/// belongs to. The raw password is gone by the time this exists.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_in: u64,
    pub principal: Principal,
}

pub struct RequestGate {
    credentials: Arc<CredentialService>,
    tokens: Arc<TokenCodec>,
    principals: Arc<dyn PrincipalRepo>,
    resources: Arc<dyn ResourceRepo>,
    policy: PolicyEngine,
    limiter: AuthRateLimiter,
    audit: Arc<dyn AuditSink>,
}

impl RequestGate {
    pub fn new(
        credentials: Arc<CredentialService>,
        tokens: Arc<TokenCodec>,
        principals: Arc<dyn PrincipalRepo>,
        resources: Arc<dyn ResourceRepo>,
        policy: PolicyEngine,
        limiter: AuthRateLimiter,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            credentials,
            tokens,
            principals,
            resources,
            policy,
            limiter,
            audit,
        }
    }

    /// Decide one resource request.
    pub async fn handle(&self, req: RequestDescriptor) -> GateOutcome {
        let action = req.action.as_str();

        // Identifier validation comes first: nothing unvalidated reaches a
        // store lookup or a log line as a trusted value.
        let resource_id = match validate::resource_id(&req.resource_id) {
            Ok(id) => id,
            Err(error) => {
                self.audit.record(
                    AuditEntry::new("anonymous", action, AuditOutcome::Rejected, error.reason_code())
                        .source(req.source.as_deref())
                        .field("rejected_resource_id", json!(req.resource_id)),
                );
                return GateOutcome::Rejected { error };
            }
        };

        let subject = match self
            .authenticate(&req.credential, req.source.as_deref())
            .await
        {
            Ok(subject) => subject,
            Err(error) => {
                let mut entry =
                    AuditEntry::new("anonymous", action, AuditOutcome::Rejected, error.reason_code())
                        .resource(resource_id.as_str())
                        .source(req.source.as_deref());
                entry = match &req.credential {
                    CredentialPresentation::Bearer(t) => {
                        entry.field("token_fp", json!(token::fingerprint(t)))
                    }
                    CredentialPresentation::Password { username, .. } => {
                        entry.field("username", json!(username))
                    }
                    CredentialPresentation::Anonymous => entry,
                };
                self.audit.record(entry);
                return GateOutcome::Rejected { error };
            }
        };

        let resource = match self.resources.find(&resource_id).await {
            Ok(Some(resource)) => resource,
            Ok(None) => {
                let error = AuthError::denied("resource_not_found");
                self.audit.record(
                    AuditEntry::new(
                        subject.audit_id(),
                        action,
                        AuditOutcome::Rejected,
                        error.reason_code(),
                    )
                    .resource(resource_id.as_str())
                    .source(req.source.as_deref()),
                );
                return GateOutcome::Rejected { error };
            }
            Err(e) => {
                warn!(error = %e, resource_id = %resource_id, "resource lookup failed");
                let error = AuthError::from(e);
                self.audit.record(
                    AuditEntry::new(
                        subject.audit_id(),
                        action,
                        AuditOutcome::Rejected,
                        error.reason_code(),
                    )
                    .resource(resource_id.as_str())
                    .source(req.source.as_deref()),
                );
                return GateOutcome::Rejected { error };
            }
        };

        let decision = self.policy.authorize(subject.principal(), &resource, req.action);
        let outcome = if decision.is_allow() {
            AuditOutcome::Admitted
        } else {
            AuditOutcome::Rejected
        };
        self.audit.record(
            AuditEntry::new(subject.audit_id(), action, outcome, decision.reason_code())
                .resource(resource_id.as_str())
                .source(req.source.as_deref()),
        );

        match decision {
            Decision::Allow(_) => GateOutcome::Admitted {
                subject,
                reason: decision.reason_code(),
            },
            Decision::Deny(_) => GateOutcome::Rejected {
                error: AuthError::denied(decision.reason_code()),
            },
        }
    }

    /// Decide a function-level administrative request. Ownership plays no
    /// part; only the subject's role counts.
    pub async fn handle_admin(
        &self,
        credential: CredentialPresentation,
        action: AdminAction,
        source: Option<&str>,
    ) -> GateOutcome {
        let subject = match self.authenticate(&credential, source).await {
            Ok(subject) => subject,
            Err(error) => {
                self.audit.record(
                    AuditEntry::new(
                        "anonymous",
                        action.as_str(),
                        AuditOutcome::Rejected,
                        error.reason_code(),
                    )
                    .source(source),
                );
                return GateOutcome::Rejected { error };
            }
        };

        let decision = self.policy.authorize_admin(subject.principal(), action);
        let outcome = if decision.is_allow() {
            AuditOutcome::Admitted
        } else {
            AuditOutcome::Rejected
        };
        self.audit.record(
            AuditEntry::new(
                subject.audit_id(),
                action.as_str(),
                outcome,
                decision.reason_code(),
            )
            .source(source),
        );

        match decision {
            Decision::Allow(_) => GateOutcome::Admitted {
                subject,
                reason: decision.reason_code(),
            },
            Decision::Deny(_) => GateOutcome::Rejected {
                error: AuthError::denied(decision.reason_code()),
            },
        }
    }

    /// Authenticate with a password and issue a session token.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        source: Option<&str>,
    ) -> Result<IssuedSession, AuthError> {
        if let Err(error) = self.limiter.check(username, source) {
            self.audit.record(
                AuditEntry::new(
                    "anonymous",
                    "auth.login",
                    AuditOutcome::Rejected,
                    error.reason_code(),
                )
                .source(source)
                .field("username", json!(username)),
            );
            return Err(error);
        }

        match self.credentials.verify(username, password).await {
            Ok(principal) => {
                self.limiter.record_success(username);
                let issued = self.tokens.issue(&principal)?;
                self.audit.record(
                    AuditEntry::new(
                        principal.id.to_string(),
                        "auth.login",
                        AuditOutcome::Admitted,
                        "authenticated",
                    )
                    .source(source),
                );
                Ok(IssuedSession {
                    token: issued.token,
                    expires_in: issued.expires_in,
                    principal,
                })
            }
            Err(error) => {
                if matches!(error, AuthError::InvalidCredential) {
                    self.limiter.record_failure(username, source);
                }
                self.audit.record(
                    AuditEntry::new(
                        "anonymous",
                        "auth.login",
                        AuditOutcome::Rejected,
                        error.reason_code(),
                    )
                    .source(source)
                    .field("username", json!(username)),
                );
                Err(error)
            }
        }
    }

    /// Resolve a credential presentation into a subject.
    ///
    /// Only `Anonymous` yields the anonymous subject; a credential that
    /// fails never downgrades to anonymous.
    async fn authenticate(
        &self,
        credential: &CredentialPresentation,
        source: Option<&str>,
    ) -> Result<Subject, AuthError> {
        match credential {
            CredentialPresentation::Anonymous => Ok(Subject::Anonymous),

            CredentialPresentation::Bearer(token) => {
                let identity = self.tokens.validate(token)?;
                let principal = self
                    .principals
                    .find(identity.principal_id)
                    .await?
                    .ok_or(AuthError::InvalidCredential)?;
                if !principal.is_active() {
                    return Err(AuthError::Locked);
                }
                Ok(Subject::Principal(principal))
            }

            CredentialPresentation::Password { username, password } => {
                // Lockout wins over credential correctness.
                self.limiter.check(username, source)?;
                match self.credentials.verify(username, password).await {
                    Ok(principal) => {
                        self.limiter.record_success(username);
                        Ok(Subject::Principal(principal))
                    }
                    Err(error) => {
                        if matches!(error, AuthError::InvalidCredential) {
                            self.limiter.record_failure(username, source);
                        }
                        Err(error)
                    }
                }
            }
        }
    }
}
