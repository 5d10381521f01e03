//! Output formats for a resolved environment

use crate::Environment;
use prefetch_errors::{ConfigError, Error};
use std::fmt::Write;
use std::str::FromStr;

/// How to render an environment for a build process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvFormat {
    /// JSON array of `{name, value, kind}` records
    Json,
    /// `export NAME='value'` lines for a POSIX shell
    Env,
}

impl FromStr for EnvFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "env" | "sh" => Ok(Self::Env),
            _ => Err(ConfigError::InvalidValue {
                field: "format".to_string(),
                value: s.to_string(),
            }
            .into()),
        }
    }
}

impl Environment {
    /// Render the variables in `format`
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render(&self, format: EnvFormat) -> Result<String, Error> {
        match format {
            EnvFormat::Json => Ok(serde_json::to_string_pretty(self.variables())?),
            EnvFormat::Env => {
                let mut out = String::new();
                for var in self.variables() {
                    let _ = writeln!(out, "export {}={}", var.name, shell_quote(&var.value));
                }
                Ok(out)
            }
        }
    }
}

/// Single-quote a value for a POSIX shell
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("off"), "'off'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("json".parse::<EnvFormat>().unwrap(), EnvFormat::Json);
        assert_eq!("env".parse::<EnvFormat>().unwrap(), EnvFormat::Env);
        assert!("yaml".parse::<EnvFormat>().is_err());
    }
}
