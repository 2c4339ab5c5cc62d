//! Session configuration
//!
//! Configuration is an immutable snapshot constructed once at startup and
//! injected into the facade. There is no mutable global: the type has no
//! setters, so "set once, read many" holds by construction, and a facade
//! cannot exist without a configuration.

use crate::error::ConfigError;

/// Password strength rules applied during registration and password change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    /// Minimum accepted length (inclusive)
    pub min_length: usize,
    /// Maximum accepted length (inclusive)
    pub max_length: usize,
    /// Require at least one non-alphanumeric character
    pub require_special_characters: bool,
    /// Require at least one ASCII digit
    pub require_numbers: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_special_characters: false,
            require_numbers: false,
        }
    }
}

/// Which identity providers the host application has enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnabledProviders {
    /// Email/password accounts
    pub password: bool,
    /// Google OAuth sign-in
    pub google: bool,
    /// Apple platform-credential sign-in
    pub apple: bool,
    /// Device biometric gating (stub)
    pub biometric: bool,
}

impl Default for EnabledProviders {
    fn default() -> Self {
        Self {
            password: true,
            google: false,
            apple: false,
            biometric: false,
        }
    }
}

/// Host-facing presentation fields. Carried in the configuration snapshot
/// for parity with the rest of the settings; the core never reads them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Branding {
    /// Application display name
    pub app_name: String,
    /// Optional logo image URL
    pub logo_url: Option<String>,
    /// Optional accent color, e.g. `#336699`
    pub accent_color: Option<String>,
}

/// Immutable process-wide authentication settings.
///
/// # Example
/// ```
/// use authkit::{AuthConfig, EnabledProviders};
///
/// let config = AuthConfig::builder("api-key", "my-project")
///     .providers(EnabledProviders { google: true, ..Default::default() })
///     .build()
///     .expect("valid configuration");
/// assert!(config.providers().google);
/// ```
#[derive(Debug, Clone)]
pub struct AuthConfig {
    api_key: String,
    project_id: String,
    providers: EnabledProviders,
    password_policy: PasswordPolicy,
    branding: Branding,
}

impl AuthConfig {
    /// Start building a configuration with the backend identifiers.
    pub fn builder(api_key: impl Into<String>, project_id: impl Into<String>) -> AuthConfigBuilder {
        AuthConfigBuilder {
            api_key: api_key.into(),
            project_id: project_id.into(),
            providers: EnabledProviders::default(),
            password_policy: PasswordPolicy::default(),
            branding: Branding::default(),
        }
    }

    /// Backend API key
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Backend project identifier
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Enabled-provider flags
    pub fn providers(&self) -> EnabledProviders {
        self.providers
    }

    /// Password strength rules
    pub fn password_policy(&self) -> &PasswordPolicy {
        &self.password_policy
    }

    /// Presentation fields
    pub fn branding(&self) -> &Branding {
        &self.branding
    }
}

/// Builder for [`AuthConfig`].
#[derive(Debug, Clone)]
pub struct AuthConfigBuilder {
    api_key: String,
    project_id: String,
    providers: EnabledProviders,
    password_policy: PasswordPolicy,
    branding: Branding,
}

impl AuthConfigBuilder {
    /// Set the enabled-provider flags
    pub fn providers(mut self, providers: EnabledProviders) -> Self {
        self.providers = providers;
        self
    }

    /// Set the password policy
    pub fn password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = policy;
        self
    }

    /// Set the presentation fields
    pub fn branding(mut self, branding: Branding) -> Self {
        self.branding = branding;
        self
    }

    /// Finalize the configuration.
    ///
    /// Fails loudly when the backend identifiers are missing: a
    /// misconfigured host must not get as far as issuing provider calls.
    pub fn build(self) -> Result<AuthConfig, ConfigError> {
        // Validate identifiers (error case first)
        if self.api_key.is_empty() {
            return Err(ConfigError::ApiKeyNotConfigured);
        }
        if self.project_id.is_empty() {
            return Err(ConfigError::ProjectIdNotConfigured);
        }

        Ok(AuthConfig {
            api_key: self.api_key,
            project_id: self.project_id,
            providers: self.providers,
            password_policy: self.password_policy,
            branding: self.branding,
        })
    }
}
