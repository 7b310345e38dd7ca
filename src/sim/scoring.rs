//! Scoring rules
//!
//! Every scoring event charges a time penalty for the seconds elapsed since
//! the previous scoring event. Penalty rates are kept in tenths so the
//! truncation toward zero stays in integer arithmetic.

/// Points awarded for a correct match before the time penalty
pub const MATCH_REWARD: i64 = 12;
/// Points lost for a wrong match before the time penalty
pub const MISMATCH_PENALTY: i64 = 3;
/// Points lost for re-tapping the pending card before the time penalty
pub const RESELECT_PENALTY: i64 = 1;

/// Time penalty per second, in tenths of a point
const MATCH_RATE_TENTHS: i64 = 2;
const MISMATCH_RATE_TENTHS: i64 = 4;
const RESELECT_RATE_TENTHS: i64 = 5;

/// Move outcomes that change the score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringRule {
    CorrectMatch,
    WrongMatch,
    /// The single pending card was tapped again
    Reselect,
}

impl ScoringRule {
    /// Signed score change for this rule after `delta_secs` seconds
    pub fn delta(self, delta_secs: u64) -> i64 {
        let secs = i64::try_from(delta_secs).unwrap_or(i64::MAX / 10);
        match self {
            ScoringRule::CorrectMatch => MATCH_REWARD - penalty(secs, MATCH_RATE_TENTHS),
            ScoringRule::WrongMatch => -(MISMATCH_PENALTY + penalty(secs, MISMATCH_RATE_TENTHS)),
            ScoringRule::Reselect => -(RESELECT_PENALTY + penalty(secs, RESELECT_RATE_TENTHS)),
        }
    }
}

fn penalty(secs: i64, rate_tenths: i64) -> i64 {
    secs.saturating_mul(rate_tenths) / 10
}

/// Apply `rule` at `elapsed_secs`, charging time since `last_event_secs`.
///
/// Returns the new score and moves the reference point to `elapsed_secs`.
pub fn apply(rule: ScoringRule, score: i64, last_event_secs: &mut u64, elapsed_secs: u64) -> i64 {
    let delta_secs = elapsed_secs.saturating_sub(*last_event_secs);
    *last_event_secs = elapsed_secs;
    score.saturating_add(rule.delta(delta_secs))
}
