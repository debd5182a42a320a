//! Wiring of both playback engines to a definition source.
//!
//! [`PlaybackService`] is what UI code talks to when it only has IDs: it
//! fetches the definition, then calls the matching engine operation.
//! Operations that only need an ID (`pause`, `stop`, ...) go straight to the
//! engines via [`PlaybackService::timers`] and [`PlaybackService::sequences`].

use std::sync::Arc;

use crate::definitions::{DefinitionError, DefinitionSource};
use crate::engine::{EngineError, SequenceEngine, TimerEngine};
use crate::types::{EngineConfig, EntityId, SequenceDefinition, TimerDefinition};

/// Playback engines plus the definition source they play from.
pub struct PlaybackService<D> {
    timers: Arc<TimerEngine>,
    sequences: Arc<SequenceEngine>,
    definitions: D,
}

impl<D: DefinitionSource> PlaybackService<D> {
    /// Creates both engines on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or there is no current runtime.
    pub fn new(config: EngineConfig, definitions: D) -> Result<Self, EngineError> {
        Ok(Self::from_engines(
            Arc::new(TimerEngine::new(config.clone())?),
            Arc::new(SequenceEngine::new(config)?),
            definitions,
        ))
    }

    /// Wraps existing engines.
    pub fn from_engines(
        timers: Arc<TimerEngine>,
        sequences: Arc<SequenceEngine>,
        definitions: D,
    ) -> Self {
        Self {
            timers,
            sequences,
            definitions,
        }
    }

    /// The timer engine.
    pub fn timers(&self) -> &Arc<TimerEngine> {
        &self.timers
    }

    /// The sequence engine.
    pub fn sequences(&self) -> &Arc<SequenceEngine> {
        &self.sequences
    }

    /// The definition source.
    pub fn definitions(&self) -> &D {
        &self.definitions
    }

    async fn timer_definition(&self, timer_id: EntityId) -> Result<TimerDefinition, DefinitionError> {
        self.definitions
            .timer(timer_id)
            .await?
            .ok_or(DefinitionError::TimerNotFound(timer_id))
    }

    async fn sequence_definition(
        &self,
        sequence_id: EntityId,
    ) -> Result<SequenceDefinition, DefinitionError> {
        self.definitions
            .sequence(sequence_id)
            .await?
            .ok_or(DefinitionError::SequenceNotFound(sequence_id))
    }

    // ------------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------------

    /// Creates idle state for a timer.
    ///
    /// # Errors
    ///
    /// Returns an error if the timer is unknown or the lookup fails.
    pub async fn initialize_timer(&self, timer_id: EntityId) -> Result<TimerDefinition, DefinitionError> {
        let timer = self.timer_definition(timer_id).await?;
        self.timers.initialize(&timer);
        Ok(timer)
    }

    /// Starts or resumes a timer.
    ///
    /// # Errors
    ///
    /// Returns an error if the timer is unknown or the lookup fails.
    pub async fn start_timer(&self, timer_id: EntityId) -> Result<TimerDefinition, DefinitionError> {
        let timer = self.timer_definition(timer_id).await?;
        self.timers.start(&timer);
        Ok(timer)
    }

    /// Resets a timer to its full duration.
    ///
    /// # Errors
    ///
    /// Returns an error if the timer is unknown or the lookup fails.
    pub async fn reset_timer(&self, timer_id: EntityId) -> Result<TimerDefinition, DefinitionError> {
        let timer = self.timer_definition(timer_id).await?;
        self.timers.reset(&timer);
        Ok(timer)
    }

    // ------------------------------------------------------------------------
    // Sequences
    // ------------------------------------------------------------------------

    /// Creates idle state for a sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence is unknown or the lookup fails.
    pub async fn initialize_sequence(
        &self,
        sequence_id: EntityId,
    ) -> Result<SequenceDefinition, DefinitionError> {
        let sequence = self.sequence_definition(sequence_id).await?;
        self.sequences.initialize(&sequence);
        Ok(sequence)
    }

    /// Starts or resumes a sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence is unknown or the lookup fails.
    pub async fn start_sequence(
        &self,
        sequence_id: EntityId,
    ) -> Result<SequenceDefinition, DefinitionError> {
        let sequence = self.sequence_definition(sequence_id).await?;
        self.sequences.start(&sequence);
        Ok(sequence)
    }

    /// Resets a sequence to its first step.
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence is unknown or the lookup fails.
    pub async fn reset_sequence(
        &self,
        sequence_id: EntityId,
    ) -> Result<SequenceDefinition, DefinitionError> {
        let sequence = self.sequence_definition(sequence_id).await?;
        self.sequences.reset(&sequence);
        Ok(sequence)
    }
}
