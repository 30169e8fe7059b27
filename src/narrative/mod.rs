//! Explanatory narratives for bloom predictions

pub mod types;
pub mod fallback;
pub mod service;
pub mod generator;

pub use types::{AlertColor, BloomStage, Narrative, NarrativeAnalysis, NarrativeContext};
pub use fallback::NarrativeFallbackGenerator;
pub use service::{extract_json_object, ChatClientConfig, ChatCompletionClient, NarrativeService};
pub use generator::{build_prompt, NarrativeGenerator};
