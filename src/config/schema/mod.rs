mod ai;
mod core;
mod gateway;
mod observability;
mod store;

pub use ai::{AiConfig, PLACEHOLDER_API_KEY};
pub use self::core::{Config, KnowledgeConfig, RouterConfig};
pub use gateway::GatewayConfig;
pub use observability::{LogLevel, ObservabilityConfig};
pub use store::StoreConfig;
