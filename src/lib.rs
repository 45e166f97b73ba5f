pub mod config;
pub mod pipeline;
pub mod pipeline_config;

pub use pipeline::{
    build_pipeline, run_pipeline, ExtractionPipeline, PipelineError, PipelineKind, PipelineRequest,
};
pub use pipeline_config::{ConfigError, ExtractorConfig};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` wins over the default filter. Calling this twice is a no-op.
pub fn init_tracing(debug: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter(debug))),
        )
        .with_writer(std::io::stderr)
        .try_init();

    tracing::debug!("docextract v{}", config::APP_VERSION);
}
