use std::sync::Arc;

use crate::remote::{QuestionSource, RankEstimator, SessionAuthority};

pub mod clock;
pub mod engine;
pub mod ledger;
pub mod scoring;

/// External collaborators the engine talks to. A single backend
/// usually implements all three contracts, but the engine only sees
/// the traits.
pub struct Collaborators {
    pub questions: Arc<dyn QuestionSource>,
    pub authority: Arc<dyn SessionAuthority>,
    pub ranks: Arc<dyn RankEstimator>,
}

impl Collaborators {
    pub fn new(
        questions: Arc<dyn QuestionSource>,
        authority: Arc<dyn SessionAuthority>,
        ranks: Arc<dyn RankEstimator>,
    ) -> Self {
        Self {
            questions,
            authority,
            ranks,
        }
    }
}
