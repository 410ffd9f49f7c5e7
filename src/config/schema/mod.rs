use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::errors::ShiftlineError;

/// Generate a `Debug` impl that redacts secret fields.
///
/// Fields wrapped in `redact(...)` print `[REDACTED]` (or `[empty]` when the
/// string is empty); all other fields print normally.
macro_rules! redact_debug {
    (@field $builder:ident, $self:ident, redact($field:ident)) => {
        $builder.field(
            stringify!($field),
            &if $self.$field.is_empty() {
                "[empty]"
            } else {
                "[REDACTED]"
            },
        );
    };
    (@field $builder:ident, $self:ident, $field:ident) => {
        $builder.field(stringify!($field), &$self.$field);
    };

    (@fields $builder:ident, $self:ident,) => {};
    (@fields $builder:ident, $self:ident, redact($field:ident), $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, redact($field));
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, $field:ident, $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, $field);
        redact_debug!(@fields $builder, $self, $($rest)*);
    };

    ($struct_name:ident, $($fields:tt)*) => {
        impl std::fmt::Debug for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut builder = f.debug_struct(stringify!($struct_name));
                redact_debug!(@fields builder, self, $($fields)*);
                builder.finish()
            }
        }
    };
}

/// Upper bound for the time between receiving a callback and sending its
/// replies. LINE reply tokens expire about a minute after the event.
pub const MAX_REPLY_BUDGET_SECS: u64 = 30;

pub const DEFAULT_REPLY_BUDGET_SECS: u64 = 25;

// ---------------------------------------------------------------------------
// LINE platform
// ---------------------------------------------------------------------------

fn default_line_api_base() -> String {
    "https://api.line.me".to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LineConfig {
    /// Channel secret used to verify `X-Line-Signature`.
    #[serde(default, rename = "channelSecret")]
    pub channel_secret: String,
    /// Long-lived channel access token for the Messaging API.
    #[serde(default, rename = "channelAccessToken")]
    pub channel_access_token: String,
    #[serde(default = "default_line_api_base", rename = "apiBaseUrl")]
    pub api_base_url: String,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_secret: String::new(),
            channel_access_token: String::new(),
            api_base_url: default_line_api_base(),
        }
    }
}

redact_debug!(
    LineConfig,
    redact(channel_secret),
    redact(channel_access_token),
    api_base_url,
);

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timezone() -> String {
    "Asia/Tokyo".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// IANA timezone used for "now" when building schedules and date pickers.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timezone: default_timezone(),
        }
    }
}

impl GatewayConfig {
    pub fn tz(&self) -> Result<chrono_tz::Tz, ShiftlineError> {
        self.timezone.parse::<chrono_tz::Tz>().map_err(|_| {
            ShiftlineError::Config(format!(
                "gateway.timezone '{}' is not a known IANA timezone",
                self.timezone
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

fn default_location() -> String {
    "global".to_string()
}

fn default_serving_config() -> String {
    "default_config".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "projectId")]
    pub project_id: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default, rename = "dataStoreId")]
    pub data_store_id: String,
    #[serde(default = "default_serving_config", rename = "servingConfig")]
    pub serving_config: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            project_id: String::new(),
            location: default_location(),
            data_store_id: String::new(),
            serving_config: default_serving_config(),
        }
    }
}

fn default_generative_location() -> String {
    "us-central1".to_string()
}

fn default_generative_model() -> String {
    "gemini-1.5-flash".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerativeConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "projectId")]
    pub project_id: String,
    #[serde(default = "default_generative_location")]
    pub location: String,
    #[serde(default = "default_generative_model")]
    pub model: String,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            project_id: String::new(),
            location: default_generative_location(),
            model: default_generative_model(),
        }
    }
}

fn default_shift_table() -> String {
    "shifts".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "projectId")]
    pub project_id: String,
    #[serde(default)]
    pub dataset: String,
    #[serde(default = "default_shift_table")]
    pub table: String,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            project_id: String::new(),
            dataset: String::new(),
            table: default_shift_table(),
        }
    }
}

fn default_collaborator_timeout() -> u64 {
    6
}

fn default_reply_budget() -> u64 {
    DEFAULT_REPLY_BUDGET_SECS
}

fn default_max_retries() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorPolicyConfig {
    /// Per-attempt timeout for search, generative and warehouse calls.
    #[serde(default = "default_collaborator_timeout", rename = "timeoutSecs")]
    pub timeout_secs: u64,
    /// Retries after the first attempt, for retryable failures only.
    #[serde(default = "default_max_retries", rename = "maxRetries")]
    pub max_retries: u32,
    /// Deadline for every reply in a callback, counted from its arrival.
    #[serde(default = "default_reply_budget", rename = "replyBudgetSecs")]
    pub reply_budget_secs: u64,
}

impl Default for CollaboratorPolicyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_collaborator_timeout(),
            max_retries: default_max_retries(),
            reply_budget_secs: default_reply_budget(),
        }
    }
}

impl CollaboratorPolicyConfig {
    pub fn reply_budget(&self) -> Duration {
        Duration::from_secs(self.reply_budget_secs)
    }

    /// Worst-case seconds spent on `calls` sequential collaborator calls.
    pub fn chain_secs(&self, calls: u64) -> u64 {
        calls * (u64::from(self.max_retries.min(1)) + 1) * self.timeout_secs
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// OAuth access token presented to Google Cloud APIs.
    #[serde(default, rename = "accessToken")]
    pub access_token: String,
}

redact_debug!(GoogleConfig, redact(access_token),);

// ---------------------------------------------------------------------------
// Root
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub line: LineConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub generative: GenerativeConfig,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub collaborators: CollaboratorPolicyConfig,
    #[serde(default)]
    pub google: GoogleConfig,
}

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ShiftlineError> {
        self.validate_gateway()?;
        self.validate_collaborators()?;
        Ok(())
    }

    /// Shift recording runs only with both generative and warehouse enabled.
    pub fn recording_enabled(&self) -> bool {
        self.generative.enabled && self.warehouse.enabled
    }

    /// Sequential collaborator calls behind the slowest reply: generative
    /// then warehouse when recording, otherwise a single search.
    pub fn longest_call_chain(&self) -> u64 {
        if self.recording_enabled() { 2 } else { 1 }
    }

    /// Serving additionally requires the LINE credentials.
    pub fn validate_for_serving(&self) -> Result<(), ShiftlineError> {
        self.validate()?;
        if self.line.channel_secret.is_empty() {
            return Err(ShiftlineError::Config(
                "line.channelSecret is required to verify callbacks".into(),
            ));
        }
        if self.line.channel_access_token.is_empty() {
            return Err(ShiftlineError::Config(
                "line.channelAccessToken is required to send replies".into(),
            ));
        }
        Ok(())
    }

    fn validate_gateway(&self) -> Result<(), ShiftlineError> {
        if self.gateway.port == 0 {
            return Err(ShiftlineError::Config("gateway.port must be > 0".into()));
        }
        if self.gateway.port < 1024 {
            warn!(
                "gateway.port {} is a privileged port (< 1024), may require elevated permissions",
                self.gateway.port
            );
        }
        self.gateway.tz()?;
        if url::Url::parse(&self.line.api_base_url).is_err() {
            return Err(ShiftlineError::Config(format!(
                "line.apiBaseUrl '{}' is not a valid URL",
                self.line.api_base_url
            )));
        }
        Ok(())
    }

    fn validate_collaborators(&self) -> Result<(), ShiftlineError> {
        let policy = &self.collaborators;
        if policy.timeout_secs == 0 {
            return Err(ShiftlineError::Config(
                "collaborators.timeoutSecs must be > 0".into(),
            ));
        }
        if policy.reply_budget_secs == 0 || policy.reply_budget_secs > MAX_REPLY_BUDGET_SECS {
            return Err(ShiftlineError::Config(format!(
                "collaborators.replyBudgetSecs must be between 1 and {}",
                MAX_REPLY_BUDGET_SECS
            )));
        }
        if policy.max_retries > 1 {
            return Err(ShiftlineError::Config(
                "collaborators.maxRetries must be 0 or 1".into(),
            ));
        }
        let chain = policy.chain_secs(self.longest_call_chain());
        if chain > policy.reply_budget_secs {
            return Err(ShiftlineError::Config(format!(
                "collaborators.timeoutSecs {}s over {} call(s) with retries ({}s) exceeds \
                 collaborators.replyBudgetSecs ({}s)",
                policy.timeout_secs,
                self.longest_call_chain(),
                chain,
                policy.reply_budget_secs
            )));
        }

        if self.search.enabled
            && (self.search.project_id.is_empty() || self.search.data_store_id.is_empty())
        {
            return Err(ShiftlineError::Config(
                "search.projectId and search.dataStoreId are required when search is enabled"
                    .into(),
            ));
        }
        if self.generative.enabled && self.generative.project_id.is_empty() {
            return Err(ShiftlineError::Config(
                "generative.projectId is required when generative is enabled".into(),
            ));
        }
        if self.warehouse.enabled
            && (self.warehouse.project_id.is_empty() || self.warehouse.dataset.is_empty())
        {
            return Err(ShiftlineError::Config(
                "warehouse.projectId and warehouse.dataset are required when warehouse is enabled"
                    .into(),
            ));
        }
        if self.generative.enabled != self.warehouse.enabled {
            warn!("shift recording needs both generative and warehouse enabled; it stays off");
        }
        if (self.search.enabled || self.generative.enabled || self.warehouse.enabled)
            && self.google.access_token.is_empty()
        {
            warn!("google.accessToken is empty; Google collaborator calls will be rejected");
        }
        Ok(())
    }
}
