//! User configuration loaded from `~/.config/coursediff/config.toml`.
//!
//! Every field is optional in the file. A missing file silently yields the
//! defaults; an unreadable or malformed file prints one line to stderr (the
//! terminal is not in raw mode yet) and also yields the defaults.

use coursediff_core::types::{Author, UserRole};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Built-in theme name, see [`crate::theme::Theme::from_name`].
    pub theme: String,
    /// Path of the SQLite database shared with the change detector.
    pub database: String,
    /// How many changes the "recent" timeline shows.
    pub recent_limit: usize,
    pub user: UserConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub id: String,
    pub name: String,
    pub role: UserRole,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: "catppuccin-mocha".to_owned(),
            database: ".coursediff/reviews.db".to_owned(),
            recent_limit: 200,
            user: UserConfig::default(),
        }
    }
}

impl Default for UserConfig {
    fn default() -> Self {
        let name = std::env::var("USER").unwrap_or_else(|_| "reviewer".to_owned());
        Self {
            id: format!("local-{name}"),
            name,
            role: UserRole::Ta,
        }
    }
}

impl UserConfig {
    pub fn author(&self) -> Author {
        Author {
            id: self.id.clone(),
            name: self.name.clone(),
            role: self.role,
        }
    }
}

/// Returns the path to the coursediff config file.
///
/// Prefers `$XDG_CONFIG_HOME/coursediff/config.toml`; falls back to
/// `~/.config/coursediff/config.toml` when the env var is absent.
pub fn config_path() -> std::path::PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(std::path::PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| std::path::PathBuf::from(h).join(".config"))
        })
        .unwrap_or_else(|| std::path::PathBuf::from(".config"));
    base.join("coursediff").join("config.toml")
}

/// Loads the config file. Never fails; see the module docs.
pub fn load() -> Config {
    let path = config_path();
    let raw = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(_) => return Config::default(),
    };
    parse(&raw).unwrap_or_else(|e| {
        eprintln!("coursediff: config parse error in {:?}: {}", path, e);
        Config::default()
    })
}

fn parse(raw: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = parse(
            r#"
            theme = "dark"

            [user]
            id = "u-7"
            name = "Grace"
            role = "Teacher"
            "#,
        )
        .unwrap();
        assert_eq!(config.theme, "dark");
        assert_eq!(config.recent_limit, 200);
        assert_eq!(config.user.author().role, UserRole::Teacher);
        assert_eq!(config.user.id, "u-7");
    }

    #[test]
    fn unknown_role_is_an_error() {
        assert!(parse("[user]\nrole = \"Dean\"").is_err());
    }
}
