pub mod gate;
pub mod marker;
pub mod pipeline;
pub mod retry;
pub mod scripts;
pub mod security;
pub mod service_admin;
pub mod sql_runner;
pub mod status;
pub mod step;

pub use gate::{GateOutcome, GateState, RunGate};
pub use marker::{FileMarker, MarkerRecord, MarkerStore};
pub use pipeline::{BootstrapPipeline, PipelineReport};
pub use retry::{retry_transient, RetryError, RetryPolicy};
pub use scripts::{ScriptCatalog, ScriptId, ScriptParams};
pub use service_admin::{HttpServiceAdmin, ServiceAdmin};
pub use sql_runner::SqlActionRunner;
pub use status::{StatusRecorder, StepStatus};
pub use step::{Step, StepContext, StepExecutor, StepOutcome, StepResult};
