use serde::{Deserialize, Serialize};

use crate::ProjectId;

/// Authenticated project admin resolved from a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminIdentity {
    subject: String,
    email: Option<String>,
    project_id: ProjectId,
}

impl AdminIdentity {
    /// Creates an admin identity from authentication data.
    #[must_use]
    pub fn new(subject: impl Into<String>, email: Option<String>, project_id: ProjectId) -> Self {
        Self {
            subject: subject.into(),
            email,
            project_id,
        }
    }

    /// Returns the stable subject for the admin.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the email used for pipeline and billing notifications.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns the project this admin credential is scoped to.
    #[must_use]
    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }
}
