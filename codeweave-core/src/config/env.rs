//! Environment variable interpolation for configuration

use super::error::ConfigError;
use regex::Regex;
use std::env;
use std::sync::LazyLock;

/// `${VAR}` placeholder
static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Replace every `${VAR}` in a configuration string with its value
///
/// Fails on the first variable that is not set.
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    interpolate_with(content, |name| env::var(name).ok())
}

/// Interpolate using an arbitrary lookup
pub fn interpolate_with<F>(content: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(content.len());
    let mut last = 0;

    for cap in ENV_VAR_PATTERN.captures_iter(content) {
        let Some(whole) = cap.get(0) else { continue };
        let name = &cap[1];
        let value = lookup(name).ok_or_else(|| ConfigError::EnvVarNotFound {
            var: name.to_string(),
        })?;

        result.push_str(&content[last..whole.start()]);
        result.push_str(&value);
        last = whole.end();
    }

    result.push_str(&content[last..]);
    Ok(result)
}

/// First `${VAR}` placeholder left in a value, if any
pub fn find_placeholder(value: &str) -> Option<&str> {
    ENV_VAR_PATTERN.find(value).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_interpolate_single_and_multiple() {
        let env = vars(&[("GEMINI_API_KEY", "g-key"), ("GROQ_API_KEY", "q-key")]);
        let content = "a: ${GEMINI_API_KEY}\nb: ${GROQ_API_KEY}, again ${GEMINI_API_KEY}";
        let result = interpolate_with(content, |n| env.get(n).cloned()).unwrap();
        assert_eq!(result, "a: g-key\nb: q-key, again g-key");
    }

    #[test]
    fn test_missing_env_var() {
        let result = interpolate_with("api_key: ${MISSING_VAR}", |_| None);
        match result {
            Err(ConfigError::EnvVarNotFound { var }) => assert_eq!(var, "MISSING_VAR"),
            other => panic!("Expected EnvVarNotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_value_is_not_reinterpolated() {
        let env = vars(&[("OUTER", "${INNER}")]);
        let result = interpolate_with("k: ${OUTER}", |n| env.get(n).cloned()).unwrap();
        assert_eq!(result, "k: ${INNER}");
        assert_eq!(find_placeholder(&result), Some("${INNER}"));
    }

    #[test]
    fn test_process_environment_lookup() {
        // PATH is set in every test environment
        assert!(interpolate_env_vars("${PATH}").is_ok());
        assert_eq!(find_placeholder("plain text"), None);
    }
}
