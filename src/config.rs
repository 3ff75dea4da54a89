use std::env;

/// Errors raised while assembling [`Config`]. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("{present} is set but {missing} is not; Google search needs both")]
    IncompleteGoogle {
        present: &'static str,
        missing: &'static str,
    },

    #[error(
        "no search backend configured. Set GOOGLE_API_KEY + GOOGLE_CSE_ID and/or BAIDU_APPBUILDER_API_KEY"
    )]
    NoSearchBackend,

    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: ApiKey,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub api_key: ApiKey,
    pub cse_id: String,
}

#[derive(Debug, Clone)]
pub struct BaiduConfig {
    pub api_key: ApiKey,
}

/// Credentials and endpoints, read once at startup and passed by reference.
///
/// Environment variables:
/// - `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `TARGET_MODEL`: required
/// - `GOOGLE_API_KEY` + `GOOGLE_CSE_ID`: Google Custom Search (both or neither)
/// - `BAIDU_APPBUILDER_API_KEY`: Baidu AppBuilder web search
/// - `PROXY_URL`: optional HTTP(S) proxy for every outbound request
///
/// At least one search backend must be configured.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub google: Option<GoogleConfig>,
    pub baidu: Option<BaiduConfig>,
    pub proxy: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let base_url = require("OPENAI_BASE_URL")?;
        validate_http_url("OPENAI_BASE_URL", &base_url)?;
        let llm = LlmConfig {
            api_key: ApiKey::new(require("OPENAI_API_KEY")?),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: require("TARGET_MODEL")?,
        };

        let google = match (get("GOOGLE_API_KEY"), get("GOOGLE_CSE_ID")) {
            (Some(key), Some(cse_id)) => Some(GoogleConfig {
                api_key: ApiKey::new(key),
                cse_id,
            }),
            (Some(_), None) => {
                return Err(ConfigError::IncompleteGoogle {
                    present: "GOOGLE_API_KEY",
                    missing: "GOOGLE_CSE_ID",
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::IncompleteGoogle {
                    present: "GOOGLE_CSE_ID",
                    missing: "GOOGLE_API_KEY",
                });
            }
            (None, None) => None,
        };

        let baidu = get("BAIDU_APPBUILDER_API_KEY").map(|key| BaiduConfig {
            api_key: ApiKey::new(key),
        });

        if google.is_none() && baidu.is_none() {
            return Err(ConfigError::NoSearchBackend);
        }

        let proxy = get("PROXY_URL");
        if let Some(p) = &proxy {
            validate_http_url("PROXY_URL", p)?;
        }

        Ok(Self {
            llm,
            google,
            baidu,
            proxy,
        })
    }
}

fn validate_http_url(var: &'static str, raw: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Invalid {
            var,
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    pub(crate) fn lookup_from(
        pairs: &[(&str, &str)],
    ) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    pub(crate) const FULL_ENV: &[(&str, &str)] = &[
        ("OPENAI_API_KEY", "sk-test"),
        ("OPENAI_BASE_URL", "https://llm.example.com/v1/"),
        ("TARGET_MODEL", "qwen2.5-32b-instruct"),
        ("GOOGLE_API_KEY", "g-key"),
        ("GOOGLE_CSE_ID", "cse-123"),
        ("BAIDU_APPBUILDER_API_KEY", "bce-key"),
    ];

    fn without(var: &str) -> Vec<(&'static str, &'static str)> {
        FULL_ENV.iter().copied().filter(|(k, _)| *k != var).collect()
    }

    #[test]
    fn full_environment_loads() {
        let config = Config::from_lookup(lookup_from(FULL_ENV)).unwrap();
        assert_eq!(config.llm.base_url, "https://llm.example.com/v1");
        assert_eq!(config.llm.model, "qwen2.5-32b-instruct");
        assert_eq!(config.google.unwrap().cse_id, "cse-123");
        assert!(config.baidu.is_some());
        assert!(config.proxy.is_none());
    }

    #[test]
    fn missing_llm_key_is_reported_by_name() {
        let err = Config::from_lookup(lookup_from(&without("OPENAI_API_KEY"))).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("OPENAI_API_KEY")));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut env = without("TARGET_MODEL");
        env.push(("TARGET_MODEL", "   "));
        let err = Config::from_lookup(lookup_from(&env)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("TARGET_MODEL")));
    }

    #[test]
    fn google_key_without_cse_id_is_rejected() {
        let err = Config::from_lookup(lookup_from(&without("GOOGLE_CSE_ID"))).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::IncompleteGoogle {
                missing: "GOOGLE_CSE_ID",
                ..
            }
        ));
    }

    #[test]
    fn baidu_alone_is_enough() {
        let env: Vec<_> = FULL_ENV
            .iter()
            .copied()
            .filter(|(k, _)| !k.starts_with("GOOGLE_"))
            .collect();
        let config = Config::from_lookup(lookup_from(&env)).unwrap();
        assert!(config.google.is_none());
        assert!(config.baidu.is_some());
    }

    #[test]
    fn no_search_backend_is_rejected() {
        let env: Vec<_> = FULL_ENV
            .iter()
            .copied()
            .filter(|(k, _)| !k.starts_with("GOOGLE_") && !k.starts_with("BAIDU_"))
            .collect();
        let err = Config::from_lookup(lookup_from(&env)).unwrap_err();
        assert!(matches!(err, ConfigError::NoSearchBackend));
    }

    #[test]
    fn invalid_proxy_is_rejected() {
        let mut env = FULL_ENV.to_vec();
        env.push(("PROXY_URL", "socks-without-scheme"));
        let err = Config::from_lookup(lookup_from(&env)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "PROXY_URL", .. }));
    }

    #[test]
    fn proxy_is_kept_when_valid() {
        let mut env = FULL_ENV.to_vec();
        env.push(("PROXY_URL", "http://127.0.0.1:7890"));
        let config = Config::from_lookup(lookup_from(&env)).unwrap();
        assert_eq!(config.proxy.as_deref(), Some("http://127.0.0.1:7890"));
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let config = Config::from_lookup(lookup_from(FULL_ENV)).unwrap();
        let dump = format!("{config:?}");
        assert!(!dump.contains("sk-test"));
        assert!(dump.contains("[REDACTED]"));
    }
}
