//! Credential checks run before every call.
//!
//! Credential cryptography is out of scope: an [`Authorizer`] receives the
//! caller's opaque credential strings and decides whether they carry the
//! privilege a verb needs on its target.

use std::collections::HashMap;

use async_trait::async_trait;

/// The AM API verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    GetVersion,
    ListResources,
    Describe,
    Allocate,
    Provision,
    Status,
    Renew,
    Delete,
    PerformOperationalAction,
}

impl Verb {
    pub fn name(&self) -> &'static str {
        match self {
            Verb::GetVersion => "GetVersion",
            Verb::ListResources => "ListResources",
            Verb::Describe => "Describe",
            Verb::Allocate => "Allocate",
            Verb::Provision => "Provision",
            Verb::Status => "Status",
            Verb::Renew => "Renew",
            Verb::Delete => "Delete",
            Verb::PerformOperationalAction => "PerformOperationalAction",
        }
    }

    /// SFA privilege a credential must grant for this verb. `None` for
    /// verbs anyone may call.
    pub fn privilege(&self) -> Option<&'static str> {
        match self {
            Verb::GetVersion => None,
            Verb::ListResources | Verb::Describe => Some("listnodes"),
            Verb::Allocate | Verb::Provision | Verb::PerformOperationalAction => {
                Some("createsliver")
            }
            Verb::Status => Some("sliverstatus"),
            Verb::Renew => Some("renewsliver"),
            Verb::Delete => Some("deletesliver"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("no credentials supplied")]
    NoCredentials,

    #[error("credentials do not grant '{privilege}' on {target}")]
    Denied { privilege: String, target: String },
}

/// Credentials accepted for a call, and who presented them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidCredentials {
    pub credentials: Vec<String>,
    pub caller_hrn: String,
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn check_credentials(
        &self,
        creds: &[String],
        privilege: &str,
        target_hrn: Option<&str>,
    ) -> Result<ValidCredentials, AuthError>;
}

/// Accepts every call as `caller_hrn`.
#[derive(Debug, Clone)]
pub struct TrustAll {
    pub caller_hrn: String,
}

#[async_trait]
impl Authorizer for TrustAll {
    async fn check_credentials(
        &self,
        creds: &[String],
        _privilege: &str,
        _target_hrn: Option<&str>,
    ) -> Result<ValidCredentials, AuthError> {
        Ok(ValidCredentials {
            credentials: creds.to_vec(),
            caller_hrn: self.caller_hrn.clone(),
        })
    }
}

#[derive(Debug, Clone)]
struct Grant {
    caller_hrn: String,
    privileges: Vec<String>,
}

/// Table of known credential strings and the privileges each grants.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorizer {
    grants: HashMap<String, Grant>,
}

impl StaticAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, credential: &str, caller_hrn: &str, privileges: &[&str]) -> Self {
        self.grants.insert(
            credential.to_string(),
            Grant {
                caller_hrn: caller_hrn.to_string(),
                privileges: privileges.iter().map(|p| p.to_string()).collect(),
            },
        );
        self
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn check_credentials(
        &self,
        creds: &[String],
        privilege: &str,
        target_hrn: Option<&str>,
    ) -> Result<ValidCredentials, AuthError> {
        if creds.is_empty() {
            return Err(AuthError::NoCredentials);
        }
        let grant = creds
            .iter()
            .filter_map(|c| self.grants.get(c))
            .find(|g| g.privileges.iter().any(|p| p == privilege || p == "*"))
            .ok_or_else(|| AuthError::Denied {
                privilege: privilege.to_string(),
                target: target_hrn.unwrap_or("aggregate").to_string(),
            })?;
        Ok(ValidCredentials {
            credentials: creds.to_vec(),
            caller_hrn: grant.caller_hrn.clone(),
        })
    }
}
