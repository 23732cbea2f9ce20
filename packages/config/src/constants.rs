// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across Draftly

// Sandbox Runtime Configuration
pub const DRAFTLY_INSTALL_COMMAND: &str = "DRAFTLY_INSTALL_COMMAND";
pub const DRAFTLY_DEV_COMMAND: &str = "DRAFTLY_DEV_COMMAND";
pub const DRAFTLY_WORKSPACE_DIR: &str = "DRAFTLY_WORKSPACE_DIR";
pub const DRAFTLY_READY_TIMEOUT_SECS: &str = "DRAFTLY_READY_TIMEOUT_SECS";
pub const DRAFTLY_CLEANUP_TIMEOUT_SECS: &str = "DRAFTLY_CLEANUP_TIMEOUT_SECS";

// AI Generation Configuration
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const DRAFTLY_API_URL: &str = "DRAFTLY_API_URL";
pub const DRAFTLY_PRIMARY_MODEL: &str = "DRAFTLY_PRIMARY_MODEL";
pub const DRAFTLY_FALLBACK_MODEL: &str = "DRAFTLY_FALLBACK_MODEL";
pub const DRAFTLY_MAX_TOKENS: &str = "DRAFTLY_MAX_TOKENS";

// System Environment Variables
pub const HOME: &str = "HOME";
pub const USERPROFILE: &str = "USERPROFILE"; // Windows
