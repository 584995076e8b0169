use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_CONFIG_PATH: &str = "config/server.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Dimension order of the tensor handed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[batch, height, width, channels]`, the Keras convention.
    #[default]
    Nhwc,
    /// `[batch, channels, height, width]`, the PyTorch convention.
    Nchw,
}

impl FromStr for TensorLayout {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nhwc" => Ok(TensorLayout::Nhwc),
            "nchw" => Ok(TensorLayout::Nchw),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model_path: String,
    pub use_cuda: bool,
    pub tensor_layout: TensorLayout,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            model_path: "model.pt".to_string(),
            use_cuda: true,
            tensor_layout: TensorLayout::Nhwc,
        }
    }
}

impl ServerConfig {
    /// Reads the YAML file named by `CONFIG_PATH` (or the default location, if present)
    /// and applies environment overrides on top.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit_path = std::env::var("CONFIG_PATH").ok();
        let config = Self::from_file(explicit_path.as_deref())?;
        config.with_overrides(|key| std::env::var(key).ok())
    }

    fn from_file(explicit_path: Option<&str>) -> Result<Self, ConfigError> {
        let path = explicit_path.unwrap_or(DEFAULT_CONFIG_PATH);
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_yaml(&contents),
            Err(e) if explicit_path.is_none() && e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config file at {}, using defaults", path);
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: "PORT", value: port })?;
        }
        if let Some(model_path) = lookup("MODEL_PATH") {
            self.model_path = model_path;
        }
        if let Some(use_cuda) = lookup("USE_CUDA") {
            self.use_cuda = match use_cuda.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "USE_CUDA",
                        value: use_cuda,
                    });
                }
            };
        }
        if let Some(layout) = lookup("TENSOR_LAYOUT") {
            self.tensor_layout = layout.parse().map_err(|_| ConfigError::InvalidValue {
                key: "TENSOR_LAYOUT",
                value: layout,
            })?;
        }
        Ok(self)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
