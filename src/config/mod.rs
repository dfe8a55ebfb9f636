// Copyright 2025 CloudWeGo Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::net::SocketAddr;
use std::str::FromStr;

use tracing::warn;

use crate::utils::errors::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    English,
    Portuguese,
}

impl Language {
    pub fn parse(v: &str) -> Option<Self> {
        match v.trim().to_lowercase().as_str() {
            "en" | "english" => Some(Language::English),
            "pt" | "pt-br" | "portuguese" => Some(Language::Portuguese),
            _ => None,
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::parse(s).ok_or_else(|| format!("unsupported prompt language `{s}` (expected en or pt)"))
    }
}

/// Connection settings for the hosted chat model.
///
/// Built once at startup and handed to the client constructor; nothing reads the
/// environment after that.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

fn default_api_version() -> String {
    "2023-05-15".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_server_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8001))
}

impl ModelConfig {
    pub fn new(endpoint: &str, api_key: &str, deployment: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            deployment: deployment.to_string(),
            api_version: default_api_version(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }

    /// Loads `.env` (if present) and reads the process environment.
    pub fn parse_from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads every option through `lookup` and validates the result.
    ///
    /// The test agent's variable names win; the `AZURE_OPENAI_*` names used by the
    /// threat server are accepted as fallbacks.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(k))
                .find(|v| !v.trim().is_empty())
        };

        let temperature = match first(&["TEMPERATURE"]) {
            Some(v) => v
                .trim()
                .parse::<f32>()
                .map_err(|e| Error::Config(format!("TEMPERATURE={v}: {e}")))?,
            None => default_temperature(),
        };
        let max_tokens = match first(&["MAX_TOKENS"]) {
            Some(v) => v
                .trim()
                .parse::<u32>()
                .map_err(|e| Error::Config(format!("MAX_TOKENS={v}: {e}")))?,
            None => default_max_tokens(),
        };

        let config = Self {
            endpoint: first(&["AZURE_ENDPOINT", "AZURE_OPENAI_ENDPOINT"]).unwrap_or_default(),
            api_key: first(&["OPENAI_API_KEY", "AZURE_OPENAI_API_KEY"]).unwrap_or_default(),
            deployment: first(&["AZURE_DEPLOYMENT_NAME", "AZURE_OPENAI_DEPLOYMENT_NAME"])
                .unwrap_or_default(),
            api_version: first(&["OPENAI_API_VERSION", "AZURE_OPENAI_API_VERSION"])
                .unwrap_or_else(default_api_version),
            temperature,
            max_tokens,
        };
        config.validate()
    }

    /// Checks required fields and normalizes the endpoint to end with `/`.
    pub fn validate(mut self) -> Result<Self, Error> {
        let mut missing = vec![];
        if self.endpoint.is_empty() {
            missing.push("AZURE_ENDPOINT");
        }
        if self.api_key.is_empty() {
            missing.push("OPENAI_API_KEY");
        }
        if self.deployment.is_empty() {
            missing.push("AZURE_DEPLOYMENT_NAME");
        }
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing required variables: {}",
                missing.join(", ")
            )));
        }
        if !self.endpoint.starts_with("https://") {
            return Err(Error::Config(format!(
                "endpoint must start with https:// (got {})",
                self.endpoint
            )));
        }
        if !self.endpoint.ends_with('/') {
            warn!(endpoint = %self.endpoint, "endpoint should end with '/', appending it");
            self.endpoint.push('/');
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::Config(format!(
                "temperature must be within 0..=2 (got {})",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(Error::Config("max_tokens must be positive".to_string()));
        }
        Ok(self)
    }

    /// The key with everything but its last characters masked, for diagnostics.
    pub fn masked_api_key(&self) -> String {
        let tail: String = self
            .api_key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("{}{}", "*".repeat(20), tail)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub simulate: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            simulate: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_and_trailing_slash() {
        let config = ModelConfig::from_lookup(lookup(&[
            ("AZURE_ENDPOINT", "https://demo.openai.azure.com"),
            ("OPENAI_API_KEY", "secret-key-1234"),
            ("AZURE_DEPLOYMENT_NAME", "gpt-4o"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint, "https://demo.openai.azure.com/");
        assert_eq!(config.api_version, "2023-05-15");
        assert_eq!(config.temperature, 0.1);
        assert_eq!(config.max_tokens, 2000);
        assert_eq!(config.masked_api_key(), format!("{}1234", "*".repeat(20)));
    }

    #[test]
    fn server_variable_names_are_fallbacks() {
        let config = ModelConfig::from_lookup(lookup(&[
            ("AZURE_OPENAI_ENDPOINT", "https://vision.openai.azure.com/"),
            ("AZURE_OPENAI_API_KEY", "k"),
            ("AZURE_OPENAI_DEPLOYMENT_NAME", "gpt-4o-vision"),
            ("AZURE_OPENAI_API_VERSION", "2024-02-01"),
            ("TEMPERATURE", "0.8"),
            ("MAX_TOKENS", "1300"),
        ]))
        .unwrap();
        assert_eq!(config.deployment, "gpt-4o-vision");
        assert_eq!(config.api_version, "2024-02-01");
        assert_eq!(config.max_tokens, 1300);
    }

    #[test]
    fn missing_required_variables() {
        let err = ModelConfig::from_lookup(lookup(&[("AZURE_ENDPOINT", "https://x/")]))
            .unwrap_err()
            .to_string();
        assert!(err.contains("OPENAI_API_KEY"));
        assert!(err.contains("AZURE_DEPLOYMENT_NAME"));
        assert!(!err.contains("AZURE_ENDPOINT"));
    }

    #[test]
    fn rejects_plain_http_and_bad_numbers() {
        let base = [
            ("OPENAI_API_KEY", "k"),
            ("AZURE_DEPLOYMENT_NAME", "d"),
        ];
        let mut pairs = base.to_vec();
        pairs.push(("AZURE_ENDPOINT", "http://insecure/"));
        assert!(matches!(
            ModelConfig::from_lookup(lookup(&pairs)),
            Err(Error::Config(_))
        ));

        let mut pairs = base.to_vec();
        pairs.push(("AZURE_ENDPOINT", "https://ok/"));
        pairs.push(("MAX_TOKENS", "lots"));
        assert!(matches!(
            ModelConfig::from_lookup(lookup(&pairs)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn language_names() {
        assert_eq!(Language::parse("EN"), Some(Language::English));
        assert_eq!(Language::parse("pt-BR"), Some(Language::Portuguese));
        assert_eq!(Language::parse("zh"), None);
        assert_eq!("pt".parse::<Language>(), Ok(Language::Portuguese));
        assert!("zh".parse::<Language>().unwrap_err().contains("zh"));
    }
}
