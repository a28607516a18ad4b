// Caller identity, read-only

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};

/// The authenticated caller as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    /// `issuer|subject`, stable across sessions
    pub token_identifier: String,
    pub subject: String,
    pub issuer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserIdentity {
    pub fn new(issuer: impl Into<String>, subject: impl Into<String>) -> Self {
        let issuer = issuer.into();
        let subject = subject.into();
        UserIdentity {
            token_identifier: format!("{issuer}|{subject}"),
            subject,
            issuer,
            name: None,
            email: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[async_trait]
pub trait Auth: Send + Sync {
    /// The current caller, or `None` for an anonymous call.
    async fn user_identity(&self) -> Result<Option<UserIdentity>>;

    /// The current caller; `Unauthenticated` when there is none.
    async fn require_identity(&self) -> Result<UserIdentity> {
        self.user_identity()
            .await?
            .ok_or(TesseraError::Unauthenticated)
    }
}

/// Fixed identity, for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    identity: Option<UserIdentity>,
}

impl StaticAuth {
    pub fn anonymous() -> Self {
        StaticAuth { identity: None }
    }

    pub fn signed_in(identity: UserIdentity) -> Self {
        StaticAuth {
            identity: Some(identity),
        }
    }
}

#[async_trait]
impl Auth for StaticAuth {
    async fn user_identity(&self) -> Result<Option<UserIdentity>> {
        Ok(self.identity.clone())
    }
}
