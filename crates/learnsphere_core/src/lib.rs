pub mod domain;
pub mod pipeline;
pub mod ports;

pub use domain::{Account, ExecutionOutcome, GenerationResult, HistoryRecord, SkillLevel};
pub use pipeline::{AttemptError, GenerationPipeline, DEFAULT_FALLBACK_CHAIN};
pub use ports::{CodeExecutionService, DatabaseService, PortError, PortResult, TextGenerationService};
