//! The review context: evaluator, cache, loaded game and its classifications
//! bundled into one owned value.

use tracing::{info, warn};

use chess_core::{GameTimeline, OpeningMatcher};

use crate::analyzer::GameAnalyzer;
use crate::cache::{CacheKey, ClassificationStore};
use crate::classifier::{Classification, MoveClassifier};
use crate::error::ReviewError;
use crate::session::PositionEvaluator;
use crate::summary::ReviewSummary;

pub struct ReviewContext<E, C> {
    evaluator: E,
    cache: C,
    classifier: MoveClassifier,
    timeline: Option<GameTimeline>,
    classifications: Option<Vec<Classification>>,
}

impl<E: PositionEvaluator, C: ClassificationStore> ReviewContext<E, C> {
    pub fn new(evaluator: E, cache: C) -> Self {
        Self {
            evaluator,
            cache,
            classifier: MoveClassifier::default(),
            timeline: None,
            classifications: None,
        }
    }

    pub fn with_openings(mut self, openings: OpeningMatcher) -> Self {
        self.classifier = MoveClassifier::new(openings);
        self
    }

    /// Replace the loaded game. On error the previous game and its
    /// classifications are kept untouched.
    pub fn load_pgn(&mut self, text: &str) -> Result<&GameTimeline, ReviewError> {
        let timeline = GameTimeline::from_pgn(text)?;
        info!(
            white = timeline.headers().white.as_str(),
            black = timeline.headers().black.as_str(),
            moves = timeline.move_count(),
            "Loaded game"
        );
        self.classifications = None;
        Ok(self.timeline.insert(timeline))
    }

    pub fn timeline(&self) -> Option<&GameTimeline> {
        self.timeline.as_ref()
    }

    /// Mutable access for cursor navigation.
    pub fn timeline_mut(&mut self) -> Option<&mut GameTimeline> {
        self.timeline.as_mut()
    }

    pub fn classifications(&self) -> Option<&[Classification]> {
        self.classifications.as_deref()
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Classify the loaded game at `depth`, reading the cache first and
    /// writing it after. A failed cache write is logged and ignored.
    pub async fn analyze<F>(
        &mut self,
        depth: u32,
        progress: F,
    ) -> Result<&[Classification], ReviewError>
    where
        F: FnMut(usize, usize),
    {
        let timeline = self.timeline.as_ref().ok_or(ReviewError::NoGameLoaded)?;
        let key = CacheKey::for_game(depth, timeline);

        let classifications = match self.cache.load(&key) {
            Some(cached) if cached.len() == timeline.move_count() => {
                info!(moves = cached.len(), depth, "Loaded classifications from cache");
                cached
            }
            cached => {
                if cached.is_some() {
                    warn!("Cached classification count does not match the game, recomputing");
                }
                let evaluations = GameAnalyzer::new(&self.evaluator, depth)
                    .analyze(timeline, progress)
                    .await?;
                let computed = self.classifier.classify(timeline, &evaluations)?;
                if let Err(e) = self.cache.store(&key, &computed) {
                    warn!(error = %e, "Failed to write classification cache");
                }
                info!(moves = computed.len(), depth, "Classified game");
                computed
            }
        };

        Ok(self.classifications.insert(classifications))
    }

    pub fn summary(&self) -> Option<ReviewSummary> {
        let timeline = self.timeline.as_ref()?;
        let classifications = self.classifications.as_ref()?;
        let first = timeline.positions()[0].side_to_move;
        Some(ReviewSummary::from_classifications(classifications, first))
    }

    /// Tear the context down, handing back the evaluator and cache.
    pub fn into_parts(self) -> (E, C) {
        (self.evaluator, self.cache)
    }
}
