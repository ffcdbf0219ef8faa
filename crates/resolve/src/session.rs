//! Fill-decision state machine.
//!
//! A [`FillSession`] is owned by the caller and threaded through every turn:
//! each step consumes the session and returns the next one together with
//! what happened. Occurrences are resolved strictly in scan order, so the
//! global value seen by occurrence `k` only reflects fills from occurrences
//! before `k`.
//!
//! Per occurrence:
//!
//! ```text
//! Pending ──reuse (global value set)──▶ Resolved
//!    │    ──fill (non-empty value)────▶ Resolved   (global value recorded if unset)
//!    └────anything else───────────────▶ AwaitingInput ──user input──▶ (oracle again)
//! ```

use std::collections::BTreeMap;

use blankfill_core::{OrderedResponse, PayloadMode, ResponsesPayload, ScanReport};
use serde::{Deserialize, Serialize};

use crate::oracle::{Decision, DecisionAction, DecisionOracle, OracleRequest};

// ── Value maps ───────────────────────────────────────────────────────

/// Label to the first value filled for it. Written at most once per label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalValueMap(BTreeMap<String, String>);

impl GlobalValueMap {
    pub fn get(&self, label: &str) -> Option<&str> {
        self.0.get(label).map(String::as_str)
    }

    /// Record `value` for `label` unless one is already recorded. Returns
    /// whether the map changed.
    pub fn record(&mut self, label: &str, value: &str) -> bool {
        if self.0.contains_key(label) {
            return false;
        }
        self.0.insert(label.to_string(), value.to_string());
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Occurrence id to its resolved value. Each id is written once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OccurrenceValueMap(BTreeMap<usize, String>);

impl OccurrenceValueMap {
    pub fn get(&self, id: usize) -> Option<&str> {
        self.0.get(&id).map(String::as_str)
    }

    fn set(&mut self, id: usize, value: &str) -> bool {
        if self.0.contains_key(&id) {
            return false;
        }
        self.0.insert(id, value.to_string());
        true
    }

    /// Values in occurrence order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.0.iter().map(|(id, v)| (*id, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// One occurrence to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: usize,
    pub label: String,
    pub context: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Reused,
    Filled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OccurrenceStatus {
    Pending,
    AwaitingInput { question: String },
    Resolved { via: Resolution },
}

/// What a turn did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnOutcome {
    Resolved {
        id: usize,
        label: String,
        value: String,
        via: Resolution,
    },
    Ask {
        id: usize,
        label: String,
        question: String,
        confidence: f64,
    },
    /// Every occurrence is resolved; nothing was asked of the oracle.
    Complete,
}

#[derive(Debug, Clone)]
pub struct Turn {
    pub session: FillSession,
    pub outcome: TurnOutcome,
}

/// Caller-owned resolution state for one document.
///
/// Deserializing checks that the state is consistent: one status per slot
/// and a cursor inside the slot list (or just past it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SessionState")]
pub struct FillSession {
    slots: Vec<Slot>,
    statuses: Vec<OccurrenceStatus>,
    cursor: usize,
    globals: GlobalValueMap,
    values: OccurrenceValueMap,
}

/// Wire form of [`FillSession`], checked before it becomes one.
#[derive(Deserialize)]
struct SessionState {
    slots: Vec<Slot>,
    statuses: Vec<OccurrenceStatus>,
    cursor: usize,
    #[serde(default)]
    globals: GlobalValueMap,
    #[serde(default)]
    values: OccurrenceValueMap,
}

impl TryFrom<SessionState> for FillSession {
    type Error = String;

    fn try_from(state: SessionState) -> Result<Self, Self::Error> {
        if state.statuses.len() != state.slots.len() {
            return Err(format!(
                "session has {} slots but {} statuses",
                state.slots.len(),
                state.statuses.len()
            ));
        }
        if state.cursor > state.slots.len() {
            return Err(format!(
                "session cursor {} is past the last of {} slots",
                state.cursor,
                state.slots.len()
            ));
        }
        Ok(Self {
            slots: state.slots,
            statuses: state.statuses,
            cursor: state.cursor,
            globals: state.globals,
            values: state.values,
        })
    }
}

impl FillSession {
    pub fn new(slots: Vec<Slot>) -> Self {
        let statuses = vec![OccurrenceStatus::Pending; slots.len()];
        Self {
            slots,
            statuses,
            ..Self::default()
        }
    }

    /// One slot per scanned occurrence, in scan order.
    pub fn from_scan(report: &ScanReport) -> Self {
        Self::new(
            report
                .occurrences
                .iter()
                .map(|occ| Slot {
                    id: occ.id,
                    label: occ.label.clone(),
                    context: report.context(occ.id).to_string(),
                })
                .collect(),
        )
    }

    /// The occurrence being resolved, or `None` once all are resolved.
    pub fn current(&self) -> Option<&Slot> {
        self.slots.get(self.cursor)
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.slots.len()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn status(&self, index: usize) -> Option<&OccurrenceStatus> {
        self.statuses.get(index)
    }

    pub fn globals(&self) -> &GlobalValueMap {
        &self.globals
    }

    pub fn values(&self) -> &OccurrenceValueMap {
        &self.values
    }

    /// The oracle request for the current occurrence.
    pub fn request(&self, user_input: &str) -> Option<OracleRequest> {
        let slot = self.current()?;
        Some(OracleRequest {
            placeholder_label: slot.label.clone(),
            occurrence_context: slot.context.clone(),
            user_input: user_input.to_string(),
            previous_global_value: self.globals.get(&slot.label).unwrap_or("").to_string(),
            prior_occurrence_value: self.values.get(slot.id).unwrap_or("").to_string(),
        })
    }

    /// Apply one oracle decision to the current occurrence.
    pub fn apply(mut self, decision: &Decision) -> Turn {
        let Some(slot) = self.current().cloned() else {
            return Turn {
                session: self,
                outcome: TurnOutcome::Complete,
            };
        };

        let previous = self.globals.get(&slot.label).unwrap_or("").to_string();
        let filled = decision.filled_value.trim();

        let resolved = match decision.action {
            DecisionAction::Reuse if !previous.trim().is_empty() => {
                Some((previous, Resolution::Reused))
            }
            DecisionAction::Fill if !filled.is_empty() => {
                Some((filled.to_string(), Resolution::Filled))
            }
            _ => None,
        };

        let outcome = match resolved {
            Some((value, via)) => {
                self.values.set(slot.id, &value);
                if via == Resolution::Filled && self.globals.record(&slot.label, &value) {
                    tracing::debug!(label = %slot.label, "recorded global value");
                }
                self.set_status(OccurrenceStatus::Resolved { via });
                self.cursor += 1;
                TurnOutcome::Resolved {
                    id: slot.id,
                    label: slot.label,
                    value,
                    via,
                }
            }
            None => {
                let question = if decision.followup_question.trim().is_empty() {
                    self.default_question(&slot.label)
                } else {
                    decision.followup_question.trim().to_string()
                };
                self.set_status(OccurrenceStatus::AwaitingInput {
                    question: question.clone(),
                });
                TurnOutcome::Ask {
                    id: slot.id,
                    label: slot.label,
                    question,
                    confidence: decision.confidence,
                }
            }
        };

        Turn {
            session: self,
            outcome,
        }
    }

    /// Run one turn against `oracle`. Oracle failures become an `ask`;
    /// they never end the session.
    pub async fn advance(self, oracle: &dyn DecisionOracle, user_input: &str) -> Turn {
        let Some(request) = self.request(user_input) else {
            return self.apply(&Decision::default());
        };
        let decision = match oracle.decide(&request).await {
            Ok(decision) => decision,
            Err(err) => {
                tracing::warn!(label = %request.placeholder_label, error = %err, "oracle call failed");
                Decision::fallback(&err, &request.placeholder_label)
            }
        };
        self.apply(&decision)
    }

    fn set_status(&mut self, status: OccurrenceStatus) {
        if let Some(slot) = self.statuses.get_mut(self.cursor) {
            *slot = status;
        }
    }

    fn default_question(&self, label: &str) -> String {
        match self.statuses.get(self.cursor) {
            Some(OccurrenceStatus::AwaitingInput { .. }) => {
                format!("Please clarify the value for {}.", label)
            }
            _ => format!("Please provide the value for {}.", label),
        }
    }

    /// One response per slot, in scan order. Unresolved slots carry an empty
    /// value, which the rewriter leaves in place.
    pub fn ordered_responses(&self) -> Vec<OrderedResponse> {
        self.slots
            .iter()
            .map(|slot| OrderedResponse {
                id: slot.id,
                label: slot.label.clone(),
                value: self.values.get(slot.id).unwrap_or("").to_string(),
            })
            .collect()
    }

    /// The first resolved value of each label.
    pub fn labeled_responses(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for slot in &self.slots {
            if let Some(value) = self.values.get(slot.id) {
                map.entry(slot.label.clone())
                    .or_insert_with(|| value.to_string());
            }
        }
        map
    }

    pub fn payload(&self, mode: PayloadMode) -> ResponsesPayload {
        match mode {
            PayloadMode::Ordered => ResponsesPayload::Ordered(self.ordered_responses()),
            PayloadMode::Labeled => ResponsesPayload::Labeled(self.labeled_responses()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleError;
    use async_trait::async_trait;

    fn slot(id: usize, label: &str) -> Slot {
        Slot {
            id,
            label: label.to_string(),
            context: format!("context {}", id),
        }
    }

    /// Oracle that pops decisions from a queue and records each request.
    struct ScriptedOracle {
        replies: std::sync::Mutex<Vec<Result<Decision, OracleError>>>,
        seen: std::sync::Mutex<Vec<OracleRequest>>,
    }

    impl ScriptedOracle {
        fn new(replies: Vec<Result<Decision, OracleError>>) -> Self {
            Self {
                replies: std::sync::Mutex::new(replies),
                seen: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DecisionOracle for ScriptedOracle {
        async fn decide(&self, request: &OracleRequest) -> Result<Decision, OracleError> {
            self.seen.lock().unwrap().push(request.clone());
            let mut queue = self.replies.lock().unwrap();
            if queue.is_empty() {
                return Err(OracleError::Unavailable("script exhausted".to_string()));
            }
            queue.remove(0)
        }
    }

    #[tokio::test]
    async fn repeated_label_is_filled_then_reused() {
        let oracle = ScriptedOracle::new(vec![
            Ok(Decision::fill("Acme Inc", 0.9)),
            Ok(Decision::reuse(0.9)),
        ]);
        let session = FillSession::new(vec![slot(0, "COMPANY NAME"), slot(1, "COMPANY NAME")]);

        let turn = session.advance(&oracle, "Acme Inc").await;
        assert!(matches!(turn.outcome, TurnOutcome::Resolved { via: Resolution::Filled, .. }));
        let turn = turn.session.advance(&oracle, "").await;
        assert!(matches!(turn.outcome, TurnOutcome::Resolved { via: Resolution::Reused, .. }));

        let session = turn.session;
        assert!(session.is_complete());
        assert_eq!(session.values().get(0), Some("Acme Inc"));
        assert_eq!(session.values().get(1), Some("Acme Inc"));

        let seen = oracle.seen.lock().unwrap();
        assert_eq!(seen[0].previous_global_value, "");
        assert_eq!(seen[1].previous_global_value, "Acme Inc");
    }

    #[tokio::test]
    async fn oracle_failure_asks_and_keeps_the_session_alive() {
        let oracle = ScriptedOracle::new(vec![
            Err(OracleError::Unavailable("connection reset".to_string())),
            Ok(Decision::fill("Acme Inc", 0.9)),
        ]);
        let session = FillSession::new(vec![slot(0, "COMPANY NAME")]);

        let turn = session.advance(&oracle, "").await;
        match &turn.outcome {
            TurnOutcome::Ask {
                question,
                confidence,
                ..
            } => {
                assert!(!question.is_empty());
                assert!(question.contains("COMPANY NAME"));
                assert_eq!(*confidence, 0.0);
            }
            other => panic!("expected ask, got {:?}", other),
        }
        assert!(!turn.session.is_complete());
        assert!(matches!(
            turn.session.status(0),
            Some(OccurrenceStatus::AwaitingInput { .. })
        ));

        let turn = turn.session.advance(&oracle, "Acme Inc").await;
        assert!(turn.session.is_complete());
    }

    #[test]
    fn first_fill_wins_for_the_global_value() {
        let session = FillSession::new(vec![slot(0, "NAME"), slot(1, "NAME"), slot(2, "NAME")]);
        let turn = session.apply(&Decision::fill("First", 0.9));
        let turn = turn.session.apply(&Decision::fill("Second", 0.9));
        let turn = turn.session.apply(&Decision::reuse(0.9));

        let session = turn.session;
        assert_eq!(session.globals().get("NAME"), Some("First"));
        assert_eq!(session.values().get(1), Some("Second"));
        assert_eq!(session.values().get(2), Some("First"));
    }

    #[test]
    fn reuse_without_a_global_value_asks() {
        let session = FillSession::new(vec![slot(0, "NAME")]);
        let turn = session.apply(&Decision::reuse(0.9));
        match turn.outcome {
            TurnOutcome::Ask { question, .. } => {
                assert_eq!(question, "Please provide the value for NAME.")
            }
            other => panic!("expected ask, got {:?}", other),
        }
        // asking again on the same occurrence switches to the clarify wording
        let turn = turn.session.apply(&Decision::fill("   ", 0.9));
        match turn.outcome {
            TurnOutcome::Ask { question, .. } => {
                assert_eq!(question, "Please clarify the value for NAME.")
            }
            other => panic!("expected ask, got {:?}", other),
        }
        assert!(turn.session.values().is_empty());
    }

    #[test]
    fn oracle_question_is_passed_through() {
        let session = FillSession::new(vec![slot(0, "$[__________]")]);
        let turn = session.apply(&Decision::ask("What is the purchase amount?", 0.85));
        assert!(matches!(
            turn.outcome,
            TurnOutcome::Ask { ref question, .. } if question == "What is the purchase amount?"
        ));
    }

    #[test]
    fn completed_session_reports_complete() {
        let session = FillSession::new(vec![]);
        assert!(session.is_complete());
        assert!(session.request("").is_none());
        let turn = session.apply(&Decision::fill("x", 1.0));
        assert_eq!(turn.outcome, TurnOutcome::Complete);
    }

    #[test]
    fn exports_follow_scan_order() {
        let session = FillSession::new(vec![
            slot(0, "COMPANY NAME"),
            slot(1, "$[__________]"),
            slot(2, "$[__________]"),
        ]);
        let turn = session.apply(&Decision::fill("Acme", 0.9));
        let turn = turn.session.apply(&Decision::fill("100", 0.9));

        let ordered = turn.session.ordered_responses();
        let values: Vec<&str> = ordered.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, vec!["Acme", "100", ""]);

        let labeled = turn.session.labeled_responses();
        assert_eq!(labeled.len(), 2);
        assert_eq!(labeled["$[__________]"], "100");
    }

    #[test]
    fn session_state_survives_serialization() {
        let session = FillSession::new(vec![slot(0, "NAME"), slot(1, "NAME")]);
        let turn = session.apply(&Decision::fill("Acme", 0.9));
        let json = serde_json::to_string(&turn.session).unwrap();
        let restored: FillSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, turn.session);
        assert_eq!(restored.current().map(|s| s.id), Some(1));
    }

    #[test]
    fn inconsistent_state_is_rejected_on_load() {
        let missing_statuses = r#"{
            "slots": [{"id": 0, "label": "NAME", "context": ""}],
            "statuses": [],
            "cursor": 0,
            "globals": {},
            "values": {}
        }"#;
        let err = serde_json::from_str::<FillSession>(missing_statuses).unwrap_err();
        assert!(err.to_string().contains("1 slots but 0 statuses"));

        let cursor_past_end = r#"{
            "slots": [{"id": 0, "label": "NAME", "context": ""}],
            "statuses": [{"state": "pending"}],
            "cursor": 5
        }"#;
        let err = serde_json::from_str::<FillSession>(cursor_past_end).unwrap_err();
        assert!(err.to_string().contains("cursor 5"));
    }

    #[test]
    fn loaded_state_can_be_applied() {
        let state = r#"{
            "slots": [{"id": 0, "label": "NAME", "context": ""}],
            "statuses": [{"state": "pending"}],
            "cursor": 0
        }"#;
        let session: FillSession = serde_json::from_str(state).unwrap();
        let turn = session.apply(&Decision::fill("Acme", 0.9));
        assert!(turn.session.is_complete());
        assert_eq!(
            turn.session.status(0),
            Some(&OccurrenceStatus::Resolved {
                via: Resolution::Filled
            })
        );
    }
}
