pub mod schema;
pub mod extraction;
pub mod query;
pub mod options;
pub mod observer;
pub mod merge;
pub mod strategy;
pub mod processor;

pub use merge::{format_json_output, merge_answers};
pub use observer::{NoopObserver, PipelineObserver, PipelineStep, SpinnerObserver};
pub use options::{parse_options, validate_options, PipelineOptions};
pub use processor::{
    build_pipeline, run_pipeline, ExtractionPipeline, IndexPipeline, ModelPipeline, PipelineError,
    PipelineRequest,
};
pub use strategy::PipelineKind;
