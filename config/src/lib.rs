pub mod paths;
pub mod settings;

pub use paths::PathManager;
pub use settings::{ConfigError, Settings, StoreConfig};

/// Load environment variables from .env files.
/// First loads from ~/.env (home directory), then from ./.env (project directory).
/// Values already present in the process environment are never overwritten,
/// so the project file only fills what the shell and ~/.env left unset.
/// Call this before parsing CLI args to ensure env vars are available.
pub fn load_env_file() {
    // Project directory first: dotenv never overrides an existing variable
    dotenv::dotenv().ok();

    if let Some(home) = dirs::home_dir() {
        let home_env_path = home.join(".env");
        dotenv::from_path(home_env_path).ok();
    }
}

/// Read a variable from the process environment, treating empty values as unset
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Tinify API key for the compression relay.
/// `TINYPNG_API_KEY` wins over the `VITE_`-prefixed name used by web builds.
pub fn tinypng_api_key(env: impl Fn(&str) -> Option<String>) -> Option<String> {
    env("TINYPNG_API_KEY").or_else(|| env("VITE_TINYPNG_API_KEY"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tinypng_api_key_precedence() {
        let both = |name: &str| match name {
            "TINYPNG_API_KEY" => Some("server".to_string()),
            "VITE_TINYPNG_API_KEY" => Some("vite".to_string()),
            _ => None,
        };
        assert_eq!(tinypng_api_key(both), Some("server".to_string()));

        let vite_only = |name: &str| (name == "VITE_TINYPNG_API_KEY").then(|| "vite".to_string());
        assert_eq!(tinypng_api_key(vite_only), Some("vite".to_string()));

        assert_eq!(tinypng_api_key(|_| None), None);
    }
}
