pub mod schema;

pub use schema::{
    AiConfig, Config, GatewayConfig, KnowledgeConfig, LogLevel, ObservabilityConfig, RouterConfig,
    StoreConfig,
};
