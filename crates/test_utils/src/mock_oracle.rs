//! A scriptable MFA oracle for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;
use veid_api::oracle::MfaOracle;
use veid_types::app::ChallengeStatus;

/// Mock oracle whose per-challenge answers are set by the test.
///
/// Unknown challenges report `Pending`.
#[derive(Default)]
pub struct MockMfaOracle {
    statuses: Mutex<BTreeMap<String, ChallengeStatus>>,
}

impl MockMfaOracle {
    /// Creates an oracle with no scripted challenges.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the status the oracle reports for `challenge_id`.
    pub fn set_status(&self, challenge_id: &str, status: ChallengeStatus) {
        self.statuses
            .lock()
            .expect("mock oracle lock poisoned")
            .insert(challenge_id.to_string(), status);
    }
}

impl MfaOracle for MockMfaOracle {
    fn challenge_status(&self, challenge_id: &str) -> ChallengeStatus {
        self.statuses
            .lock()
            .expect("mock oracle lock poisoned")
            .get(challenge_id)
            .copied()
            .unwrap_or(ChallengeStatus::Pending)
    }
}
