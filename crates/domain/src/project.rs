use helmspan_core::{AppError, AppResult, NonEmptyString, ProjectId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Network a project is billed and deployed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkSelector {
    /// Production network.
    Main,
    /// Test network.
    Test,
}

impl NetworkSelector {
    /// Returns the stable network name used in manifests and environments.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Test => "test",
        }
    }

    /// Parses a network selector from its stable name.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "main" => Ok(Self::Main),
            "test" => Ok(Self::Test),
            other => Err(AppError::Validation(format!(
                "network must be 'main' or 'test', got '{other}'"
            ))),
        }
    }
}

/// Input for creating a validated project.
#[derive(Debug, Clone)]
pub struct ProjectInput {
    /// Stable external project handle.
    pub id: ProjectId,
    /// Human-readable project name.
    pub display_name: String,
    /// Network selector for deployments and billing.
    pub network: NetworkSelector,
    /// Funding private key material, exactly one per project.
    pub funding_key: String,
    /// Balance in the smallest monetary unit; may go negative.
    pub balance: i64,
    /// Free-form engine configuration; must be a JSON object.
    pub engine_config: Value,
    /// Optional verified custom domain for the public-facing service.
    pub frontend_domain: Option<String>,
    /// Optional verified custom domain for the API-facing service.
    pub backend_domain: Option<String>,
    /// Opaque admin bearer credential.
    pub admin_token: String,
}

/// Billable tenant owning one isolated deployment environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    id: ProjectId,
    display_name: NonEmptyString,
    network: NetworkSelector,
    funding_key: NonEmptyString,
    balance: i64,
    engine_config: Value,
    frontend_domain: Option<String>,
    backend_domain: Option<String>,
    admin_token: NonEmptyString,
}

impl Project {
    /// Creates a validated project.
    pub fn new(input: ProjectInput) -> AppResult<Self> {
        if !input.engine_config.is_object() {
            return Err(AppError::Validation(
                "engine_config must be a JSON object".to_owned(),
            ));
        }

        let frontend_domain = normalize_domain(input.frontend_domain)?;
        let backend_domain = normalize_domain(input.backend_domain)?;

        Ok(Self {
            id: input.id,
            display_name: NonEmptyString::new(input.display_name)?,
            network: input.network,
            funding_key: NonEmptyString::new(input.funding_key)?,
            balance: input.balance,
            engine_config: input.engine_config,
            frontend_domain,
            backend_domain,
            admin_token: NonEmptyString::new(input.admin_token)?,
        })
    }

    /// Returns the stable project identifier.
    #[must_use]
    pub fn id(&self) -> ProjectId {
        self.id
    }

    /// Returns the project display name.
    #[must_use]
    pub fn display_name(&self) -> &NonEmptyString {
        &self.display_name
    }

    /// Returns the network the project deploys against.
    #[must_use]
    pub fn network(&self) -> NetworkSelector {
        self.network
    }

    /// Returns the funding key material.
    #[must_use]
    pub fn funding_key(&self) -> &NonEmptyString {
        &self.funding_key
    }

    /// Returns the balance snapshot in the smallest monetary unit.
    #[must_use]
    pub fn balance(&self) -> i64 {
        self.balance
    }

    /// Returns the engine configuration object.
    #[must_use]
    pub fn engine_config(&self) -> &Value {
        &self.engine_config
    }

    /// Returns the verified frontend custom domain, when set.
    #[must_use]
    pub fn frontend_domain(&self) -> Option<&str> {
        self.frontend_domain.as_deref()
    }

    /// Returns the verified backend custom domain, when set.
    #[must_use]
    pub fn backend_domain(&self) -> Option<&str> {
        self.backend_domain.as_deref()
    }

    /// Returns the admin bearer credential.
    #[must_use]
    pub fn admin_token(&self) -> &NonEmptyString {
        &self.admin_token
    }

    /// Returns a copy of this snapshot with a different balance.
    #[must_use]
    pub fn with_balance(mut self, balance: i64) -> Self {
        self.balance = balance;
        self
    }
}

/// Membership granting one identity management rights over a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectAdmin {
    project_id: ProjectId,
    subject: NonEmptyString,
    email: Option<String>,
}

impl ProjectAdmin {
    /// Creates a validated project admin membership.
    pub fn new(
        project_id: ProjectId,
        subject: impl Into<String>,
        email: Option<String>,
    ) -> AppResult<Self> {
        let email = email.and_then(|value| {
            let trimmed = value.trim().to_owned();
            (!trimmed.is_empty()).then_some(trimmed)
        });

        Ok(Self {
            project_id,
            subject: NonEmptyString::new(subject)?,
            email,
        })
    }

    /// Returns the owning project identifier.
    #[must_use]
    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the admin subject.
    #[must_use]
    pub fn subject(&self) -> &NonEmptyString {
        &self.subject
    }

    /// Returns the notification email, when one is on file.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

fn normalize_domain(value: Option<String>) -> AppResult<Option<String>> {
    let Some(value) = value else {
        return Ok(None);
    };

    let trimmed = value.trim().trim_end_matches('.').to_ascii_lowercase();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if !trimmed.contains('.') || trimmed.contains(|c: char| c.is_whitespace() || c == '/') {
        return Err(AppError::Validation(format!(
            "invalid custom domain '{value}'"
        )));
    }

    Ok(Some(trimmed))
}

#[cfg(test)]
mod tests {
    use helmspan_core::ProjectId;
    use serde_json::json;

    use super::{NetworkSelector, Project, ProjectAdmin, ProjectInput};

    fn project_input() -> ProjectInput {
        ProjectInput {
            id: ProjectId::new(),
            display_name: "Orbit Shop".to_owned(),
            network: NetworkSelector::Test,
            funding_key: "fk-material".to_owned(),
            balance: 1_000,
            engine_config: json!({"LOG_LEVEL": "debug"}),
            frontend_domain: Some("Shop.Example.COM.".to_owned()),
            backend_domain: None,
            admin_token: "token".to_owned(),
        }
    }

    #[test]
    fn project_normalizes_custom_domains() {
        let project = Project::new(project_input());
        assert!(project.is_ok());
        let project = project.unwrap_or_else(|_| unreachable!());
        assert_eq!(project.frontend_domain(), Some("shop.example.com"));
        assert_eq!(project.backend_domain(), None);
    }

    #[test]
    fn project_rejects_non_object_engine_config() {
        let mut input = project_input();
        input.engine_config = json!("not-an-object");
        assert!(Project::new(input).is_err());
    }

    #[test]
    fn project_rejects_malformed_domain() {
        let mut input = project_input();
        input.frontend_domain = Some("no-dots".to_owned());
        assert!(Project::new(input).is_err());
    }

    #[test]
    fn network_selector_round_trips() {
        let parsed = NetworkSelector::parse("main");
        assert!(parsed.is_ok());
        assert_eq!(
            parsed.unwrap_or(NetworkSelector::Test),
            NetworkSelector::Main
        );
        assert!(NetworkSelector::parse("devnet").is_err());
    }

    #[test]
    fn project_admin_drops_blank_email() {
        let admin = ProjectAdmin::new(ProjectId::new(), "alice", Some("  ".to_owned()));
        assert!(admin.is_ok());
        assert_eq!(admin.unwrap_or_else(|_| unreachable!()).email(), None);
    }
}
