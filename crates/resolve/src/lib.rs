//! blankfill-resolve: negotiates a value for every scanned occurrence.
//!
//! - [`FillSession`] -- the caller-owned state machine, one occurrence at a time
//! - [`DecisionOracle`] -- the reuse/fill/ask decision contract
//! - [`HeuristicOracle`] -- offline oracle
//! - [`LlmOracle`] -- LLM-backed oracle (feature `llm`)

pub mod oracle;
pub mod session;

pub use oracle::{
    Decision, DecisionAction, DecisionOracle, HeuristicOracle, OracleError, OracleRequest,
};
#[cfg(feature = "llm")]
pub use oracle::{LlmClient, LlmError, LlmOracle, Message};
pub use session::{
    FillSession, GlobalValueMap, OccurrenceStatus, OccurrenceValueMap, Resolution, Slot, Turn,
    TurnOutcome,
};
