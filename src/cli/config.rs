//! Turning command-line flags into a `VisualizerConfig`

use crate::cli::main_impl::{Cli, CliOutputFormat};
use crate::{
    config::{OutputFormat, VisualizerConfig},
    models::ModelSpec,
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use std::path::Path;

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Start from `--config` (or defaults) and apply flag overrides
    pub(crate) fn from_cli(cli: &Cli) -> Result<VisualizerConfig> {
        let mut config = match &cli.config {
            Some(path) => VisualizerConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => VisualizerConfig::default(),
        };

        if let Some(provider) = &cli.execution_provider {
            let (backend_type, execution_provider) =
                ExecutionProviderManager::parse_provider_string(provider)
                    .context("Invalid execution provider format")?;
            config.backend_type = backend_type;
            config.execution_provider = execution_provider;
        }
        if let Some(dir) = &cli.output_dir {
            config.output_dir.clone_from(dir);
        }
        if let Some(format) = cli.format {
            config.output_format = format.into();
        }
        if let Some(quality) = cli.jpeg_quality {
            config.jpeg_quality = quality;
        }
        if cli.threads > 0 {
            config.intra_threads = cli.threads;
            config.inter_threads = cli.threads;
        }
        if cli.align {
            config.align_textures = true;
        }
        if let Some(model) = &cli.classifier_model {
            config.classifier_model = parse_model_arg(model);
        }
        if let Some(model) = &cli.segmenter_model {
            config.segmenter_model = parse_model_arg(model);
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

/// A path to a model directory, or the id of a cached model
pub(crate) fn parse_model_arg(arg: &str) -> ModelSpec {
    let path = Path::new(arg);
    if path.is_dir() || arg.contains(std::path::MAIN_SEPARATOR) || arg.starts_with('.') {
        ModelSpec::external(path)
    } else {
        ModelSpec::cached(arg)
    }
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => Self::Png,
            CliOutputFormat::Jpeg => Self::Jpeg,
            CliOutputFormat::Webp => Self::WebP,
            CliOutputFormat::Tiff => Self::Tiff,
        }
    }
}
