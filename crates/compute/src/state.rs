use foundation::ids::LayerId;
use runtime::generation::{Generation, GenerationCounter};
use tracing::debug;

use crate::aggregator::{AggregationOutcome, LayerDataMap};

/// Latest accepted aggregation result as seen by one consumer.
///
/// Each consumer owns its own counter: take a ticket with [`Self::begin`]
/// before awaiting `fetch_all_data`, then hand the ticket back to
/// [`Self::apply`] with the outcome.
#[derive(Debug, Default)]
pub struct LayerDataState {
    pub generation: Generation,
    pub data: LayerDataMap,
    pub error: Option<String>,
    generations: GenerationCounter,
}

impl LayerDataState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Generation {
        self.generations.begin()
    }

    /// Accept `outcome` only if `generation` is the most recently started call.
    ///
    /// Results of superseded calls are dropped, whatever order they finish in.
    pub fn apply(&mut self, generation: Generation, outcome: AggregationOutcome) -> bool {
        if !self.generations.is_current(generation) {
            debug!(
                stale = generation.0,
                latest = self.generations.latest().0,
                "discarding superseded layer data"
            );
            return false;
        }
        self.generation = generation;
        self.data = outcome.data;
        self.error = outcome.error;
        true
    }

    pub fn has_data(&self, id: &LayerId) -> bool {
        self.data.contains_key(id)
    }
}
