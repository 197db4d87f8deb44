//! Parsing of `backend:provider` strings and provider discovery

use crate::{
    config::ExecutionProvider,
    error::{Result, TileVizError},
    inference::BackendType,
};

/// Information about an execution provider
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub execution_provider: ExecutionProvider,
    pub available: bool,
    pub description: String,
}

pub struct ExecutionProviderManager;

impl ExecutionProviderManager {
    /// Parse execution provider string in format "backend:provider"
    ///
    /// ```rust
    /// use tileviz::utils::ExecutionProviderManager;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let (backend, provider) = ExecutionProviderManager::parse_provider_string("tract:cpu")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn parse_provider_string(provider_str: &str) -> Result<(BackendType, ExecutionProvider)> {
        let Some((backend, provider)) = provider_str.split_once(':') else {
            return match provider_str {
                "onnx" => Ok((BackendType::Onnx, ExecutionProvider::Auto)),
                "tract" => Ok((BackendType::Tract, ExecutionProvider::Cpu)),
                _ => Err(TileVizError::invalid_config(
                    "Invalid provider format. Use backend:provider (e.g., onnx:auto, tract:cpu)",
                )),
            };
        };

        match backend {
            "onnx" => {
                let execution_provider = provider.parse::<ExecutionProvider>().map_err(|_| {
                    TileVizError::invalid_config(format!(
                        "Unknown ONNX provider: {provider}. Supported: auto, cpu, cuda, coreml"
                    ))
                })?;
                Ok((BackendType::Onnx, execution_provider))
            },
            "tract" if provider == "cpu" => Ok((BackendType::Tract, ExecutionProvider::Cpu)),
            "tract" => Err(TileVizError::invalid_config(format!(
                "Unknown Tract provider: {provider}. Tract only supports 'cpu'"
            ))),
            _ => Err(TileVizError::invalid_config(format!(
                "Unknown backend: {backend}. Supported backends: onnx, tract"
            ))),
        }
    }

    /// All provider combinations with their availability in this build
    #[must_use]
    pub fn list_all_providers() -> Vec<ProviderInfo> {
        let mut providers = Vec::new();

        #[cfg(feature = "onnx")]
        {
            let availability: std::collections::HashMap<String, bool> =
                crate::backends::OnnxBackend::list_providers()
                    .into_iter()
                    .map(|(name, available, _)| (name.to_lowercase(), available))
                    .collect();
            let any_available = availability.values().any(|&available| available);

            for provider in [
                ExecutionProvider::Auto,
                ExecutionProvider::Cpu,
                ExecutionProvider::Cuda,
                ExecutionProvider::CoreMl,
            ] {
                let available = match provider {
                    ExecutionProvider::Auto => any_available,
                    other => availability.get(&other.to_string()).copied().unwrap_or(false),
                };
                providers.push(ProviderInfo {
                    name: Self::provider_to_string(BackendType::Onnx, provider),
                    backend_type: BackendType::Onnx,
                    execution_provider: provider,
                    available,
                    description: format!("ONNX Runtime ({provider})"),
                });
            }
        }

        #[cfg(not(feature = "onnx"))]
        providers.push(ProviderInfo {
            name: "onnx:auto".to_string(),
            backend_type: BackendType::Onnx,
            execution_provider: ExecutionProvider::Auto,
            available: false,
            description: "ONNX Runtime (feature disabled)".to_string(),
        });

        providers.push(ProviderInfo {
            name: "tract:cpu".to_string(),
            backend_type: BackendType::Tract,
            execution_provider: ExecutionProvider::Cpu,
            available: cfg!(feature = "tract"),
            description: if cfg!(feature = "tract") {
                "Pure Rust CPU inference via Tract".to_string()
            } else {
                "Pure Rust CPU inference via Tract (feature disabled)".to_string()
            },
        });

        providers
    }

    #[must_use]
    pub fn provider_to_string(backend_type: BackendType, provider: ExecutionProvider) -> String {
        format!("{backend_type}:{provider}")
    }
}
