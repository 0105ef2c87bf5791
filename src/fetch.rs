//! HTTP access to the upstream feeds.
//!
//! The MTA has published its realtime feeds behind two authentication
//! schemes over the years: the legacy datamine endpoint reads the key from
//! a `key` query parameter, while api.mta.info reads an `x-api-key` header.
//! [`FeedClient`] holds one [`reqwest::Client`] for the lifetime of the
//! proxy and applies whichever scheme the configuration selects to every
//! request.

use anyhow::{Context, Result};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Url;
use std::time::Duration;

use crate::config::ProxyConfig;

/// Where the upstream endpoint expects the API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKey {
    /// Appended to every request URL, as on the legacy datamine endpoint.
    QueryParam { name: String, key: String },
    /// Sent as a request header, as on api.mta.info.
    Header { name: HeaderName, value: HeaderValue },
}

pub struct FeedClient {
    http: reqwest::Client,
    api_key: Option<ApiKey>,
}

impl FeedClient {
    /// Builds a client with timeouts sized for feed snapshots: upstream
    /// messages are at most a few hundred kilobytes, and a fetch still
    /// running after 30 seconds is eating into the next cycle.
    pub fn new(api_key: Option<ApiKey>) -> Result<FeedClient> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("building HTTP client")?;
        Ok(FeedClient { http, api_key })
    }

    /// Selects the key scheme from the configuration: with
    /// `api_key_header` set the key is sent as that header, otherwise it
    /// rides in the `key` query parameter.
    pub fn from_config(config: &ProxyConfig, key: Option<String>) -> Result<FeedClient> {
        FeedClient::new(select_api_key(config, key)?)
    }

    /// Fetches one URL, applying the configured key, and returns the body.
    pub async fn fetch_bytes(&self, url: Url) -> Result<Vec<u8>> {
        let mut request = self.http.get(url);
        match &self.api_key {
            Some(ApiKey::QueryParam { name, key }) => {
                request = request.query(&[(name.as_str(), key.as_str())]);
            }
            Some(ApiKey::Header { name, value }) => {
                request = request.header(name.clone(), value.clone());
            }
            None => {}
        }

        let response = request.send().await?;
        Ok(response.error_for_status()?.bytes().await?.to_vec())
    }
}

fn select_api_key(config: &ProxyConfig, key: Option<String>) -> Result<Option<ApiKey>> {
    let Some(key) = key else {
        return Ok(None);
    };
    match &config.api_key_header {
        Some(header) => Ok(Some(ApiKey::Header {
            name: header
                .parse()
                .with_context(|| format!("invalid api_key_header {:?}", header))?,
            value: key
                .parse()
                .context("API key is not a valid header value")?,
        })),
        None => Ok(Some(ApiKey::QueryParam {
            name: "key".to_string(),
            key,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_defaults_to_query_param() {
        let config = ProxyConfig::default();
        let api_key = select_api_key(&config, Some("secret".to_string())).unwrap();
        assert_eq!(
            api_key,
            Some(ApiKey::QueryParam {
                name: "key".to_string(),
                key: "secret".to_string(),
            })
        );
    }

    #[test]
    fn test_key_goes_into_configured_header() {
        let config = ProxyConfig {
            api_key_header: Some("x-api-key".to_string()),
            ..ProxyConfig::default()
        };
        let api_key = select_api_key(&config, Some("secret".to_string())).unwrap();
        assert_eq!(
            api_key,
            Some(ApiKey::Header {
                name: HeaderName::from_static("x-api-key"),
                value: HeaderValue::from_static("secret"),
            })
        );
    }

    #[test]
    fn test_no_key_means_no_auth() {
        let config = ProxyConfig {
            api_key_header: Some("x-api-key".to_string()),
            ..ProxyConfig::default()
        };
        assert_eq!(select_api_key(&config, None).unwrap(), None);
    }

    #[test]
    fn test_invalid_header_name_is_an_error() {
        let config = ProxyConfig {
            api_key_header: Some("not a header".to_string()),
            ..ProxyConfig::default()
        };
        assert!(select_api_key(&config, Some("secret".to_string())).is_err());
    }
}
