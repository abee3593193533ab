pub mod consolidation;
pub mod error;
pub mod graph;
pub mod role;
pub mod runtime;

pub use consolidation::{build_reflection_report, extract_and_persist_decision, format_lessons_block, process_signal};
pub use error::{OrchestratorError, OrchestratorResult};
pub use graph::{create_initial_state, stream_analysis, GraphConfig, GraphDeps};
pub use role::{AgentRole, RecursionTier};
pub use runtime::{bind_tools, run_agent_turn, AgentTurnOutcome};
