/*
 * Responsibility
 * - Config から依存一式を組み立てる (repos → services → gate)
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::config::Config;
use crate::error::AuthError;
use crate::repos::principal_repo::{InMemoryPrincipalRepo, PrincipalRepo};
use crate::repos::resource_repo::{InMemoryResourceRepo, ResourceRepo};
use crate::services::audit::{AuditSink, TracingAuditSink};
use crate::services::credential::CredentialService;
use crate::services::gate::RequestGate;
use crate::services::policy::PolicyEngine;
use crate::services::rate_limit::AuthRateLimiter;
use crate::services::token::TokenCodec;

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<RequestGate>,
    pub credentials: Arc<CredentialService>,
    pub tokens: Arc<TokenCodec>,
    pub principals: Arc<dyn PrincipalRepo>,
    pub resources: Arc<dyn ResourceRepo>,
    pub audit: Arc<dyn AuditSink>,
}

impl AppState {
    /// Build the full service graph, auditing through `tracing`.
    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        Self::with_sink(config, Arc::new(TracingAuditSink::new()))
    }

    /// Same as [`AppState::from_config`] with a caller-supplied audit sink.
    pub fn with_sink(config: &Config, audit: Arc<dyn AuditSink>) -> Result<Self, AuthError> {
        let principals: Arc<dyn PrincipalRepo> = Arc::new(InMemoryPrincipalRepo::new());
        let resources: Arc<dyn ResourceRepo> = Arc::new(InMemoryResourceRepo::new());

        let tokens = Arc::new(TokenCodec::new(
            &config.signing_secret,
            &config.issuer,
            &config.audience,
            config.access_token_ttl_seconds,
            config.access_token_leeway_seconds,
        )?);

        let credentials = Arc::new(CredentialService::new(
            principals.clone(),
            config.password_policy,
            config.bcrypt_cost,
        )?);

        let gate = Arc::new(RequestGate::new(
            credentials.clone(),
            tokens.clone(),
            principals.clone(),
            resources.clone(),
            PolicyEngine::default(),
            AuthRateLimiter::new(config.rate_limit),
            audit.clone(),
        ));

        Ok(Self {
            gate,
            credentials,
            tokens,
            principals,
            resources,
            audit,
        })
    }
}
