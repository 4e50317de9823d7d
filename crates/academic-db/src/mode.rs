//! Deployment mode.

use std::fmt;

/// Environment variable selecting the deployment mode. Read by the host's
/// configuration layer, which owns the environment lookup.
pub const MODE_ENV_VAR: &str = "ACADEMIC_ENV";

/// Fallback variable, honoured when [`MODE_ENV_VAR`] is unset.
pub const NODE_ENV_VAR: &str = "NODE_ENV";

/// Where the process is running. Decides the storage path and whether the
/// data directory is created on startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeploymentMode {
    /// Deployed: fixed absolute data directory, created if missing.
    Production,
    /// Anything else: database file in the working directory.
    #[default]
    Other,
}

impl DeploymentMode {
    /// Maps a mode string. Only `production` (exact, as deployments set it)
    /// selects [`DeploymentMode::Production`].
    pub fn parse(value: &str) -> Self {
        if value == "production" {
            Self::Production
        } else {
            Self::Other
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_exact_production_is_production() {
        assert_eq!(DeploymentMode::parse("production"), DeploymentMode::Production);
        assert_eq!(DeploymentMode::parse("Production"), DeploymentMode::Other);
        assert_eq!(DeploymentMode::parse("development"), DeploymentMode::Other);
        assert_eq!(DeploymentMode::parse(""), DeploymentMode::Other);
    }
}
