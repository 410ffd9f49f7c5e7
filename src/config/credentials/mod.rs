use super::schema::Config;
use tracing::debug;

macro_rules! define_credentials {
    ($( $name:literal, $env:literal => $($path:ident).+ );* $(;)?) => {
        /// All known credential slot names.
        pub const CREDENTIAL_NAMES: &[&str] = &[$($name),*];

        /// (slot name, env var name) pairs.
        pub const CREDENTIAL_ENV_VARS: &[(&str, &str)] = &[$(($name, $env)),*];

        /// Get the current value of a credential field by slot name.
        pub fn get_credential_value<'a>(config: &'a Config, name: &str) -> Option<&'a str> {
            match name {
                $($name => Some(config.$($path).+.as_str()),)*
                _ => None,
            }
        }

        /// Apply overrides from an arbitrary variable lookup.
        ///
        /// Any variable that is set and non-empty overwrites the corresponding
        /// config field.
        pub fn apply_overrides_with<F>(config: &mut Config, lookup: F)
        where
            F: Fn(&str) -> Option<String>,
        {
            $(
                if let Some(val) = lookup($env)
                    && !val.is_empty()
                {
                    debug!("credential {} overridden from {}", $name, $env);
                    config.$($path).+ = val;
                }
            )*
        }
    };
}

define_credentials! {
    "line-channel-secret",       "SHIFTLINE_LINE_CHANNEL_SECRET"       => line.channel_secret;
    "line-channel-access-token", "SHIFTLINE_LINE_CHANNEL_ACCESS_TOKEN" => line.channel_access_token;
    "google-access-token",       "SHIFTLINE_GOOGLE_ACCESS_TOKEN"       => google.access_token;
}

/// Apply environment variable overrides.
///
/// Any `SHIFTLINE_*` credential env var that is set and non-empty overwrites
/// the config field, so secrets can be injected without touching the config
/// file (containers, Cloud Run).
pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides_with(config, |key| std::env::var(key).ok());
}
