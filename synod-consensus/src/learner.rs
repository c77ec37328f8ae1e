use serde::Serialize;
use serde_json::Value;

use synod_common::ProposalNum;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LearnerState {
    pub learned_proposal: Option<ProposalNum>,
    pub learned_value: Option<Value>,
}

impl LearnerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome, overwriting whatever was there.
    /// Returns the previous pair when it held a different value.
    pub fn learn(&mut self, proposal: ProposalNum, value: Value) -> Option<(ProposalNum, Value)> {
        let previous = self.learned();
        self.learned_proposal = Some(proposal);
        self.learned_value = Some(value);
        previous.filter(|(_, old)| Some(old) != self.learned_value.as_ref())
    }

    pub fn learned(&self) -> Option<(ProposalNum, Value)> {
        match (self.learned_proposal, &self.learned_value) {
            (Some(proposal), Some(value)) => Some((proposal, value.clone())),
            _ => None,
        }
    }

    pub fn has_learned(&self) -> bool {
        self.learned_proposal.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_learn_and_relearn() {
        let mut learner = LearnerState::new();
        assert!(!learner.has_learned());

        assert_eq!(learner.learn(10, json!("hello")), None);
        assert_eq!(learner.learned(), Some((10, json!("hello"))));

        // same value under a higher number is not a conflict
        assert_eq!(learner.learn(12, json!("hello")), None);
        assert_eq!(learner.learned_proposal, Some(12));

        assert_eq!(learner.learn(15, json!("other")), Some((12, json!("hello"))));
        assert_eq!(learner.learned_value, Some(json!("other")));
    }
}
