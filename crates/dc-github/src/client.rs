use octocrab::Octocrab;
use thiserror::Error;

use dc_core::config::GitHubSettings;

use crate::patch::PatchError;
use crate::retry::RetryClass;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        retry_after: Option<u64>,
        message: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("missing GitHub token: set GITHUB_TOKEN or pass it in GitHubSettings")]
    MissingToken,

    #[error("environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("malformed remote payload: {0}")]
    Protocol(String),

    #[error("patch error: {0}")]
    Patch(#[from] PatchError),
}

pub type Result<T> = std::result::Result<T, GitHubError>;

impl GitHubError {
    /// The HTTP status carried by this failure, when one exists.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api(octocrab::Error::GitHub { source, .. }) => {
                Some(source.status_code.as_u16())
            }
            Self::Http { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            _ => None,
        }
    }

    /// Numeric Retry-After seconds, when the response carried one.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// True for failures that mean "the resource does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_)) || matches!(self.status(), Some(404) | Some(410))
    }
}

impl RetryClass for GitHubError {
    fn status(&self) -> Option<u16> {
        GitHubError::status(self)
    }

    fn retry_after_secs(&self) -> Option<u64> {
        GitHubError::retry_after(self)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GitHubClient {
    pub(crate) octocrab: Octocrab,
    pub(crate) owner: String,
    pub(crate) repo: String,
}

impl GitHubClient {
    /// Create a new `GitHubClient` from explicit [`GitHubSettings`].
    pub fn new(settings: &GitHubSettings) -> Result<Self> {
        let token = settings.token.clone().ok_or(GitHubError::MissingToken)?;

        let octocrab = Octocrab::builder().personal_token(token).build()?;

        Ok(Self {
            octocrab,
            owner: settings.owner.clone(),
            repo: settings.repo.clone(),
        })
    }

    /// Create a new `GitHubClient` by reading `GITHUB_TOKEN`, `GITHUB_OWNER`,
    /// and `GITHUB_REPO` from the environment.
    pub fn new_from_env() -> Result<Self> {
        let settings = GitHubSettings {
            token: Some(std::env::var("GITHUB_TOKEN")?),
            owner: std::env::var("GITHUB_OWNER")?,
            repo: std::env::var("GITHUB_REPO")?,
            ..GitHubSettings::default()
        };

        Self::new(&settings)
    }

    /// Returns a reference to the inner `Octocrab` instance.
    pub fn inner(&self) -> &Octocrab {
        &self.octocrab
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }
}
