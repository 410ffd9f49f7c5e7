pub mod credentials;
pub mod loader;
pub mod schema;

pub use loader::{get_config_path, load_config, save_config};
pub use schema::{
    CollaboratorPolicyConfig, Config, GatewayConfig, GenerativeConfig, GoogleConfig, LineConfig,
    DEFAULT_REPLY_BUDGET_SECS, MAX_REPLY_BUDGET_SECS, SearchConfig, WarehouseConfig,
};
