mod settings;

pub use settings::{
    DispatchConfig, LogFormat, LoggingConfig, ServerConfig, Settings, SvixConfig,
};
