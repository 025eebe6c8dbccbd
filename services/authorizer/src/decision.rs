use crate::config::AuthorizerConfig;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Outcome of checking a bearer token against a project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// Token is registered for the project
    Allow,
    /// Token is the deny sentinel
    Deny,
    /// Token is the unauthorized sentinel (401-style outcome)
    Unauthorized,
    /// Anything else, including a valid token presented for another project
    Invalid,
}

impl AuthDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Unauthorized => "unauthorized",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for AuthDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only lookup of (token, project) registrations.
///
/// Built once from [`AuthorizerConfig`] and shared between requests; no state
/// is carried from one decision to the next.
#[derive(Debug, Clone)]
pub struct TokenTable {
    /// Token to the projects it is registered for
    grants: HashMap<String, HashSet<String>>,
    deny_token: String,
    unauthorized_token: String,
}

impl TokenTable {
    pub fn new(config: &AuthorizerConfig) -> Self {
        let mut grants: HashMap<String, HashSet<String>> = HashMap::new();
        for grant in &config.tokens {
            grants
                .entry(grant.token.clone())
                .or_default()
                .insert(grant.project.clone());
        }

        Self {
            grants,
            deny_token: config.deny_token.clone(),
            unauthorized_token: config.unauthorized_token.clone(),
        }
    }

    /// Decide whether `token` may access `project`.
    ///
    /// Registered grants win over the sentinels.
    pub fn decide(&self, token: &str, project: &str) -> AuthDecision {
        let granted = self
            .grants
            .get(token)
            .is_some_and(|projects| projects.contains(project));

        if granted {
            AuthDecision::Allow
        } else if token == self.deny_token {
            AuthDecision::Deny
        } else if token == self.unauthorized_token {
            AuthDecision::Unauthorized
        } else {
            AuthDecision::Invalid
        }
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}
