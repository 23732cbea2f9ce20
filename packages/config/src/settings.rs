use crate::constants::*;
use std::env;
use std::fmt;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_INSTALL_COMMAND: &str = "pnpm install";
pub const DEFAULT_DEV_COMMAND: &str = "npm run dev";
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CLEANUP_TIMEOUT_SECS: u64 = 5;

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_PRIMARY_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_FALLBACK_MODEL: &str = "claude-3-5-haiku-20241022";
pub const DEFAULT_MAX_TOKENS: u32 = 16384;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid number for {name}: {source}")]
    InvalidNumber {
        name: String,
        #[source]
        source: ParseIntError,
    },
    #[error("{name} must be greater than zero")]
    ZeroValue { name: String },
    #[error("Command for {name} is empty")]
    EmptyCommand { name: String },
    #[error("Unable to determine a home directory for the default workspace")]
    NoHomeDirectory,
}

/// A program plus its arguments, parsed from a whitespace separated string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl FromStr for CommandSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let program = parts.next().ok_or_else(|| ConfigError::EmptyCommand {
            name: s.to_string(),
        })?;
        Ok(Self::new(program, parts))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Settings for the sandbox runtime: the fixed install/run command pair and timeouts
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub install_command: CommandSpec,
    pub dev_command: CommandSpec,
    pub workspace_dir: PathBuf,
    pub ready_timeout: Duration,
    pub cleanup_timeout: Duration,
}

impl RuntimeSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build settings from an arbitrary variable lookup (the process environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let install_command =
            read_command(&lookup, DRAFTLY_INSTALL_COMMAND, DEFAULT_INSTALL_COMMAND)?;
        let dev_command = read_command(&lookup, DRAFTLY_DEV_COMMAND, DEFAULT_DEV_COMMAND)?;

        let workspace_dir = match lookup(DRAFTLY_WORKSPACE_DIR) {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => default_workspace_dir(&lookup)?,
        };

        let ready_timeout = Duration::from_secs(read_positive(
            &lookup,
            DRAFTLY_READY_TIMEOUT_SECS,
            DEFAULT_READY_TIMEOUT_SECS,
        )?);
        let cleanup_timeout = Duration::from_secs(read_positive(
            &lookup,
            DRAFTLY_CLEANUP_TIMEOUT_SECS,
            DEFAULT_CLEANUP_TIMEOUT_SECS,
        )?);

        Ok(Self {
            install_command,
            dev_command,
            workspace_dir,
            ready_timeout,
            cleanup_timeout,
        })
    }

    /// Settings rooted at an explicit workspace directory with default commands and timeouts
    pub fn with_workspace_dir(workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_command: CommandSpec::new("pnpm", ["install"]),
            dev_command: CommandSpec::new("npm", ["run", "dev"]),
            workspace_dir: workspace_dir.into(),
            ready_timeout: Duration::from_secs(DEFAULT_READY_TIMEOUT_SECS),
            cleanup_timeout: Duration::from_secs(DEFAULT_CLEANUP_TIMEOUT_SECS),
        }
    }
}

/// Settings for the completion client used by code generation
#[derive(Debug, Clone)]
pub struct AiSettings {
    pub api_key: Option<String>,
    pub api_url: String,
    pub primary_model: String,
    pub fallback_model: String,
    pub max_tokens: u32,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            primary_model: DEFAULT_PRIMARY_MODEL.to_string(),
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl AiSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_key = lookup(ANTHROPIC_API_KEY).filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            info!("{} not set - code generation is unavailable", ANTHROPIC_API_KEY);
        }

        let primary_model = lookup(DRAFTLY_PRIMARY_MODEL).unwrap_or(defaults.primary_model);
        if primary_model != DEFAULT_PRIMARY_MODEL {
            info!("Using custom primary model: {}", primary_model);
        }

        let max_tokens = read_positive(&lookup, DRAFTLY_MAX_TOKENS, u64::from(DEFAULT_MAX_TOKENS))?;

        Ok(Self {
            api_key,
            api_url: lookup(DRAFTLY_API_URL).unwrap_or(defaults.api_url),
            primary_model,
            fallback_model: lookup(DRAFTLY_FALLBACK_MODEL).unwrap_or(defaults.fallback_model),
            max_tokens: u32::try_from(max_tokens).unwrap_or(u32::MAX),
        })
    }
}

fn read_command<F>(lookup: &F, name: &str, default: &str) -> Result<CommandSpec, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name).unwrap_or_else(|| default.to_string());
    raw.parse::<CommandSpec>()
        .map_err(|_| ConfigError::EmptyCommand {
            name: name.to_string(),
        })
}

fn read_positive<F>(lookup: &F, name: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|source| ConfigError::InvalidNumber {
                name: name.to_string(),
                source,
            })?,
        None => default,
    };

    if value == 0 {
        return Err(ConfigError::ZeroValue {
            name: name.to_string(),
        });
    }
    Ok(value)
}

fn default_workspace_dir<F>(lookup: &F) -> Result<PathBuf, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // HOME first so tests can redirect it, then the platform lookup
    let home = lookup(HOME)
        .or_else(|| lookup(USERPROFILE))
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .ok_or(ConfigError::NoHomeDirectory)?;
    Ok(home.join(".draftly").join("workspace"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_runtime_defaults() {
        let settings =
            RuntimeSettings::from_lookup(lookup_from(&[(HOME, "/home/tester")])).unwrap();

        assert_eq!(settings.install_command, CommandSpec::new("pnpm", ["install"]));
        assert_eq!(settings.dev_command, CommandSpec::new("npm", ["run", "dev"]));
        assert_eq!(
            settings.workspace_dir,
            PathBuf::from("/home/tester/.draftly/workspace")
        );
        assert_eq!(settings.ready_timeout, Duration::from_secs(120));
        assert_eq!(settings.cleanup_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_runtime_overrides() {
        let settings = RuntimeSettings::from_lookup(lookup_from(&[
            (DRAFTLY_INSTALL_COMMAND, "npm ci --silent"),
            (DRAFTLY_DEV_COMMAND, "yarn dev"),
            (DRAFTLY_WORKSPACE_DIR, "/tmp/draftly"),
            (DRAFTLY_READY_TIMEOUT_SECS, "30"),
        ]))
        .unwrap();

        assert_eq!(settings.install_command.to_string(), "npm ci --silent");
        assert_eq!(settings.dev_command.args, vec!["dev".to_string()]);
        assert_eq!(settings.workspace_dir, PathBuf::from("/tmp/draftly"));
        assert_eq!(settings.ready_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = RuntimeSettings::from_lookup(lookup_from(&[
            (HOME, "/home/tester"),
            (DRAFTLY_READY_TIMEOUT_SECS, "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));

        let err = RuntimeSettings::from_lookup(lookup_from(&[
            (HOME, "/home/tester"),
            (DRAFTLY_CLEANUP_TIMEOUT_SECS, "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroValue { .. }));

        let err = RuntimeSettings::from_lookup(lookup_from(&[
            (HOME, "/home/tester"),
            (DRAFTLY_DEV_COMMAND, "   "),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyCommand { .. }));
    }

    #[test]
    fn test_ai_settings() {
        let settings = AiSettings::from_lookup(lookup_from(&[
            (ANTHROPIC_API_KEY, "sk-test"),
            (DRAFTLY_PRIMARY_MODEL, "claude-custom"),
        ]))
        .unwrap();

        assert_eq!(settings.api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.primary_model, "claude-custom");
        assert_eq!(settings.fallback_model, DEFAULT_FALLBACK_MODEL);
        assert_eq!(settings.api_url, DEFAULT_API_URL);

        let blank = AiSettings::from_lookup(lookup_from(&[(ANTHROPIC_API_KEY, " ")])).unwrap();
        assert!(blank.api_key.is_none());
    }
}
