//! Turn processing
//!
//! Advances the matching state machine by one tap. Pure and synchronous: the
//! caller supplies the session timer value and schedules any revert it is
//! told about.

use super::board::Position;
use super::scoring::{self, ScoringRule};
use super::state::{GameEvent, GameState, Phase};
use crate::error::GameError;

/// Result of a single tap
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TapOutcome {
    /// False when the tap was ignored and nothing changed
    pub accepted: bool,
    /// Events raised by this tap, in order
    pub events: Vec<GameEvent>,
    /// Mismatched pair the caller must flip back after the revert delay
    pub revert: Option<(Position, Position)>,
}

impl TapOutcome {
    fn ignored() -> Self {
        Self::default()
    }

    fn accepted(events: Vec<GameEvent>) -> Self {
        Self {
            accepted: true,
            events,
            revert: None,
        }
    }

    pub fn won(&self) -> bool {
        self.events.contains(&GameEvent::Win)
    }
}

/// Process a tap on `pos` with the session timer at `elapsed_secs`.
///
/// Taps are ignored while paused, while a revert is pending, after the win,
/// and on matched cells. An out-of-range position is an error and leaves the
/// state untouched.
pub fn tap(
    state: &mut GameState,
    pos: Position,
    elapsed_secs: u64,
) -> Result<TapOutcome, GameError> {
    let card = *state.board.card(pos)?;
    if state.paused || card.matched {
        return Ok(TapOutcome::ignored());
    }

    match state.phase {
        Phase::Idle => {
            if card.face_up {
                return Ok(TapOutcome::ignored());
            }
            state.board.flip(pos, true)?;
            state.moves = state.moves.saturating_add(1);
            state.phase = Phase::AwaitingPartner(pos);
            Ok(TapOutcome::accepted(vec![GameEvent::Flip]))
        }
        Phase::AwaitingPartner(pending) if pending == pos => {
            state.board.flip(pos, false)?;
            state.moves = state.moves.saturating_add(1);
            score(state, ScoringRule::Reselect, elapsed_secs);
            state.phase = Phase::Idle;
            Ok(TapOutcome::accepted(vec![GameEvent::Flip]))
        }
        Phase::AwaitingPartner(pending) => {
            state.board.flip(pos, true)?;
            state.moves = state.moves.saturating_add(1);
            evaluate(state, pending, pos, elapsed_secs)
        }
        Phase::RevertPending(..) | Phase::Won => Ok(TapOutcome::ignored()),
    }
}

/// Compare the two face-up cards and settle the turn
fn evaluate(
    state: &mut GameState,
    first: Position,
    second: Position,
    elapsed_secs: u64,
) -> Result<TapOutcome, GameError> {
    let a = state.board.card(first)?.pair_id;
    let b = state.board.card(second)?.pair_id;

    if a == b {
        state.board.mark_matched(first, second)?;
        score(state, ScoringRule::CorrectMatch, elapsed_secs);
        let mut events = vec![GameEvent::Flip, GameEvent::Success];
        if state.board.all_matched() {
            events.push(GameEvent::Win);
            state.phase = Phase::Won;
            state.paused = true;
        } else {
            state.phase = Phase::Idle;
        }
        return Ok(TapOutcome::accepted(events));
    }

    score(state, ScoringRule::WrongMatch, elapsed_secs);
    state.phase = Phase::RevertPending(first, second);
    Ok(TapOutcome {
        accepted: true,
        events: vec![GameEvent::Flip, GameEvent::Failure],
        revert: Some((first, second)),
    })
}

fn score(state: &mut GameState, rule: ScoringRule, elapsed_secs: u64) {
    state.score = scoring::apply(
        rule,
        state.score,
        &mut state.last_scoring_secs,
        elapsed_secs,
    );
}

/// Flip a mismatched pair back down once the revert delay has passed.
///
/// Returns false, changing nothing, if the state is no longer waiting on
/// exactly this pair.
pub fn finish_revert(
    state: &mut GameState,
    first: Position,
    second: Position,
) -> Result<bool, GameError> {
    if state.phase != Phase::RevertPending(first, second) {
        return Ok(false);
    }
    state.board.flip(first, false)?;
    state.board.flip(second, false)?;
    state.phase = Phase::Idle;
    Ok(true)
}

/// Toggle pause. Returns the new flag, or `None` once the session is won.
pub fn toggle_pause(state: &mut GameState) -> Option<bool> {
    if state.won() {
        return None;
    }
    state.paused = !state.paused;
    Some(state.paused)
}
