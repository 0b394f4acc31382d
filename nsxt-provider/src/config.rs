//! Provider connection settings.
//!
//! Settings come from the command line or environment, then the `provider`
//! block of the configuration document, then defaults.

use std::time::Duration;

use clap::Args;
use nsxt_sdk::ClientConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, Result};
use crate::retry::RetryPolicy;

pub const DEFAULT_MAX_RETRIES: u32 = 4;
pub const DEFAULT_RETRY_MIN_DELAY_MS: u64 = 500;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// The `provider "nsxt"` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_unverified_ssl: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_min_delay: Option<u64>,
    /// Milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_max_delay: Option<u64>,
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
}

impl ProviderConfig {
    /// Fill unset fields from `fallback`.
    pub fn merge(self, fallback: ProviderConfig) -> ProviderConfig {
        ProviderConfig {
            host: self.host.or(fallback.host),
            username: self.username.or(fallback.username),
            password: self.password.or(fallback.password),
            allow_unverified_ssl: self.allow_unverified_ssl.or(fallback.allow_unverified_ssl),
            max_retries: self.max_retries.or(fallback.max_retries),
            retry_min_delay: self.retry_min_delay.or(fallback.retry_min_delay),
            retry_max_delay: self.retry_max_delay.or(fallback.retry_max_delay),
            request_timeout: self.request_timeout.or(fallback.request_timeout),
        }
    }

    pub fn client_config(&self) -> Result<ClientConfig> {
        let host = self
            .host
            .clone()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| ProviderError::Config("host is not set (NSXT_MANAGER_HOST)".to_string()))?;
        let username = self
            .username
            .clone()
            .ok_or_else(|| ProviderError::Config("username is not set (NSXT_USERNAME)".to_string()))?;

        Ok(ClientConfig {
            host,
            username,
            password: self.password.clone().unwrap_or_default(),
            allow_unverified_ssl: self.allow_unverified_ssl.unwrap_or(false),
            timeout: Duration::from_secs(
                self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            Duration::from_millis(self.retry_min_delay.unwrap_or(DEFAULT_RETRY_MIN_DELAY_MS)),
            Duration::from_millis(self.retry_max_delay.unwrap_or(DEFAULT_RETRY_MAX_DELAY_MS)),
        )
    }
}

/// Connection flags shared by every `nsxt` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ProviderArgs {
    /// NSX-T manager host, optionally with scheme and port
    #[arg(long, env = "NSXT_MANAGER_HOST", global = true)]
    pub host: Option<String>,

    #[arg(long, env = "NSXT_USERNAME", global = true)]
    pub username: Option<String>,

    #[arg(long, env = "NSXT_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Accept self-signed manager certificates
    #[arg(long, env = "NSXT_ALLOW_UNVERIFIED_SSL", global = true)]
    pub allow_unverified_ssl: Option<bool>,

    /// Consistency checks after create/destroy before giving up
    #[arg(long, env = "NSXT_MAX_RETRIES", global = true)]
    pub max_retries: Option<u32>,

    /// Initial backoff in milliseconds
    #[arg(long, env = "NSXT_RETRY_MIN_DELAY", global = true)]
    pub retry_min_delay: Option<u64>,

    /// Backoff cap in milliseconds
    #[arg(long, env = "NSXT_RETRY_MAX_DELAY", global = true)]
    pub retry_max_delay: Option<u64>,

    /// Request timeout in seconds
    #[arg(long, env = "NSXT_REQUEST_TIMEOUT", global = true)]
    pub request_timeout: Option<u64>,
}

impl From<ProviderArgs> for ProviderConfig {
    fn from(args: ProviderArgs) -> Self {
        ProviderConfig {
            host: args.host,
            username: args.username,
            password: args.password,
            allow_unverified_ssl: args.allow_unverified_ssl,
            max_retries: args.max_retries,
            retry_min_delay: args.retry_min_delay,
            retry_max_delay: args.retry_max_delay,
            request_timeout: args.request_timeout,
        }
    }
}
