//! Service modules for the report analysis pipeline
//!
//! - `vision_client` / `image_fetcher`: outbound HTTP (inference endpoint, image store)
//! - `classifier`: two-stage waste classification with retries and fallbacks
//! - `response_extractor` / `volume_parser`: tolerant parsing of model output
//! - `hotspot_engine`: incremental spatial clustering
//! - `report_pipeline`: drives one report from `submitted` to `analyzed`

pub mod classifier;
pub mod hotspot_engine;
pub mod image_fetcher;
pub mod prompts;
pub mod report_pipeline;
pub mod response_extractor;
pub mod vision_client;
pub mod volume_parser;

pub use classifier::{ClassificationError, TwoStageClassifier};
pub use hotspot_engine::{
    ClusterOutcome, ClusterSettings, ClusterUpdate, ClusteringStrategy, FirstMatchStrategy,
    HotspotEngine,
};
pub use image_fetcher::{HttpImageFetcher, ImageFetchError, ImageFetcher};
pub use report_pipeline::ReportPipeline;
pub use response_extractor::{extract, JsonObject, ParseError};
pub use vision_client::{BedrockVisionClient, InferenceConfig, TransportError, VisionModel};
pub use volume_parser::parse_volume;
