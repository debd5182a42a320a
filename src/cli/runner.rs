//! Foreground playback for the CLI.
//!
//! Starts one timer or sequence, prints a progress line on every state
//! change, and returns once the run completes, is stopped elsewhere, or the
//! `interrupt` future resolves (Ctrl-C in the binary).

use std::future::Future;

use anyhow::{Context, Result};

use super::display::Display;
use crate::definitions::DefinitionSource;
use crate::service::PlaybackService;
use crate::types::EntityId;

/// How a foreground run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Ran to the end
    Completed,
    /// Stopped, reset or cleared by something other than the runner
    Stopped,
    /// The runner was interrupted and stopped the run itself
    Interrupted,
}

/// Resolves on the first Ctrl-C.
///
/// If the signal handler cannot be installed the run simply cannot be
/// interrupted.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Runs a timer in the foreground.
///
/// # Errors
///
/// Returns an error if the timer is unknown or the engine shuts down mid-run.
pub async fn play_timer<D, I>(
    service: &PlaybackService<D>,
    timer_id: EntityId,
    interrupt: I,
) -> Result<RunOutcome>
where
    D: DefinitionSource,
    I: Future<Output = ()>,
{
    let engine = service.timers();
    let mut watch = engine.watch(timer_id);
    let timer = service.start_timer(timer_id).await?;
    Display::show_timer_started(&timer);

    tokio::pin!(interrupt);
    loop {
        tokio::select! {
            changed = watch.changed() => {
                let state = changed.context("timer engine shut down")?;
                let Some(state) = state else {
                    Display::show_stopped(&timer.label);
                    return Ok(RunOutcome::Stopped);
                };
                Display::show_timer_progress(&timer, &state);
                if state.is_complete() {
                    Display::show_complete(&timer.label);
                    return Ok(RunOutcome::Completed);
                }
                if !state.is_running {
                    Display::show_stopped(&timer.label);
                    return Ok(RunOutcome::Stopped);
                }
            }
            () = &mut interrupt => {
                engine.stop(timer_id);
                Display::show_stopped(&timer.label);
                return Ok(RunOutcome::Interrupted);
            }
        }
    }
}

/// Runs a sequence in the foreground.
///
/// # Errors
///
/// Returns an error if the sequence is unknown or the engine shuts down
/// mid-run.
pub async fn play_sequence<D, I>(
    service: &PlaybackService<D>,
    sequence_id: EntityId,
    interrupt: I,
) -> Result<RunOutcome>
where
    D: DefinitionSource,
    I: Future<Output = ()>,
{
    let engine = service.sequences();
    let mut watch = engine.watch(sequence_id);
    let sequence = service.start_sequence(sequence_id).await?;
    if engine.run_id(sequence_id).is_none() {
        anyhow::bail!("sequence {} has no steps", sequence_id);
    }
    let steps = engine
        .steps(sequence_id)
        .with_context(|| format!("steps of sequence {} are not loaded", sequence_id))?;
    Display::show_sequence_started(&sequence);

    tokio::pin!(interrupt);
    loop {
        tokio::select! {
            changed = watch.changed() => {
                let state = changed.context("sequence engine shut down")?;
                let Some(state) = state else {
                    Display::show_stopped(&sequence.name);
                    return Ok(RunOutcome::Stopped);
                };
                Display::show_sequence_progress(&sequence, &steps, &state);
                if state.is_complete {
                    Display::show_complete(&sequence.name);
                    return Ok(RunOutcome::Completed);
                }
                if !state.is_running {
                    Display::show_stopped(&sequence.name);
                    return Ok(RunOutcome::Stopped);
                }
            }
            () = &mut interrupt => {
                engine.stop(sequence_id);
                Display::show_stopped(&sequence.name);
                return Ok(RunOutcome::Interrupted);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
