//! Vote eligibility and selection rules.
//!
//! Everything here is a pure function of a [`Poll`], a [`Selection`] and the
//! current time, so UI code can call it on every event to decide which
//! controls to enable.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{
    poll::{Poll, SelectionMode},
    results::{ResultRow, ResultView, VoteResult},
    selection::Selection,
    VariantId,
};

/// Why a selection change or a submission was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("The poll is closed")]
    PollClosed,
    #[error("No variant selected")]
    NoSelectionMade,
    #[error("A single-choice poll takes exactly one variant")]
    InvalidSelectionCount,
    #[error("At most {0} variant(s) may be selected")]
    SelectionLimitExceeded(u32),
    #[error("Variant '{0}' does not belong to this poll")]
    UnknownVariant(VariantId),
}

/// A poll is closed once its deadline has been reached. Polls without a deadline never close.
pub fn is_closed(poll: &Poll, now: DateTime<Utc>) -> bool {
    poll.deadline.map_or(false, |deadline| now >= deadline)
}

/// The largest selection the poll accepts: always 1 for single polls.
pub fn effective_max(poll: &Poll) -> u32 {
    match poll.mode {
        SelectionMode::Single => 1,
        SelectionMode::Multi => poll.max_selections.max(1),
    }
}

/// Toggle `variant_id` in `current`, returning the new selection.
///
/// Single polls replace whatever was chosen. Multi polls deselect a chosen
/// variant, or add an unchosen one if there is room under the cap.
pub fn toggle_choice(
    poll: &Poll,
    current: &Selection,
    variant_id: &str,
) -> Result<Selection, SelectionError> {
    match poll.mode {
        SelectionMode::Single => Ok(Selection::only(variant_id)),
        SelectionMode::Multi => {
            if current.contains(variant_id) {
                return Ok(current.without(variant_id));
            }
            let max = effective_max(poll);
            if current.len() >= max as usize {
                return Err(SelectionError::SelectionLimitExceeded(max));
            }
            Ok(current.with(variant_id))
        }
    }
}

/// Check a selection before it is sent. The first failing rule is reported.
pub fn validate_submission(
    poll: &Poll,
    selection: &Selection,
    now: DateTime<Utc>,
) -> Result<(), SelectionError> {
    if is_closed(poll, now) {
        return Err(SelectionError::PollClosed);
    }
    if selection.is_empty() {
        return Err(SelectionError::NoSelectionMade);
    }
    let max = effective_max(poll);
    match poll.mode {
        SelectionMode::Single if selection.len() != 1 => Err(SelectionError::InvalidSelectionCount),
        SelectionMode::Multi if selection.len() > max as usize => {
            Err(SelectionError::SelectionLimitExceeded(max))
        }
        _ => Ok(()),
    }
}

/// Share of `count` in `total` as a whole percentage, rounded half-up. Zero when nobody voted.
pub fn percentage(count: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    // floor(count * 100 / total + 1/2), kept in integers.
    let scaled = (u128::from(count) * 200 + u128::from(total)) / (u128::from(total) * 2);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// Build the results table: rows sorted by descending count (stable on ties),
/// the first row with any votes marked as winner.
pub fn compute_result_view(result: &VoteResult) -> ResultView {
    let mut tallies = result.results.iter().collect::<Vec<_>>();
    tallies.sort_by(|a, b| b.count.cmp(&a.count));

    let rows = tallies
        .into_iter()
        .enumerate()
        .map(|(i, tally)| ResultRow {
            variant_id: tally.id.clone(),
            label: tally.label.clone(),
            count: tally.count,
            percentage: percentage(tally.count, result.total),
            // Sorted descending, so only the first row can lead.
            is_winner: i == 0 && tally.count > 0,
            voters: if result.is_anonymous {
                Vec::new()
            } else {
                tally.voters.clone().unwrap_or_default()
            },
        })
        .collect();

    ResultView {
        poll_id: result.poll_id.clone(),
        total: result.total,
        total_voters: result.total_voters,
        participation_rate: result.participation_rate,
        is_anonymous: result.is_anonymous,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::model::results::{VariantTally, Voter};

    fn ids(selection: &Selection) -> Vec<&str> {
        selection.iter().map(String::as_str).collect()
    }

    #[test]
    fn open_without_deadline() {
        let poll = Poll::single_example();
        assert!(!is_closed(&poll, Utc::now()));
        assert!(!is_closed(&poll, Utc::now() + Duration::days(10_000)));
    }

    #[test]
    fn closed_at_and_after_deadline() {
        let mut poll = Poll::single_example();
        let deadline = Utc::now();
        poll.deadline = Some(deadline);

        assert!(!is_closed(&poll, deadline - Duration::milliseconds(1)));
        assert!(is_closed(&poll, deadline));
        assert!(is_closed(&poll, deadline + Duration::milliseconds(1)));
    }

    #[test]
    fn closed_is_monotonic() {
        let mut poll = Poll::single_example();
        let deadline = Utc::now();
        poll.deadline = Some(deadline);

        let mut seen_closed = false;
        for offset in -50..50 {
            let closed = is_closed(&poll, deadline + Duration::seconds(offset));
            assert!(!seen_closed || closed, "reopened at offset {offset}");
            seen_closed |= closed;
        }
        assert!(seen_closed);
    }

    #[test]
    fn effective_max_by_mode() {
        let mut poll = Poll::single_example();
        poll.max_selections = 5;
        assert_eq!(effective_max(&poll), 1);

        assert_eq!(effective_max(&Poll::multi_example(3)), 3);
        assert_eq!(effective_max(&Poll::multi_example(0)), 1);
    }

    #[test]
    fn single_toggle_always_replaces() {
        let poll = Poll::single_example();
        let priors = [
            Selection::new(),
            Selection::only("v1"),
            ["v1", "v2", "v3"].into_iter().collect(),
        ];
        for prior in &priors {
            for variant in ["v1", "v2", "v3"] {
                let next = toggle_choice(&poll, prior, variant).unwrap();
                assert_eq!(ids(&next), vec![variant]);
            }
        }
    }

    #[test]
    fn single_scenario() {
        let poll = Poll::single_example();
        let selection = toggle_choice(&poll, &Selection::new(), "v2").unwrap();
        let selection = toggle_choice(&poll, &selection, "v1").unwrap();

        assert_eq!(ids(&selection), vec!["v1"]);
        assert_eq!(validate_submission(&poll, &selection, Utc::now()), Ok(()));
    }

    #[test]
    fn multi_scenario() {
        let poll = Poll::multi_example(2);
        let selection = toggle_choice(&poll, &Selection::new(), "v1").unwrap();
        let selection = toggle_choice(&poll, &selection, "v2").unwrap();

        assert_eq!(
            toggle_choice(&poll, &selection, "v3"),
            Err(SelectionError::SelectionLimitExceeded(2))
        );
        assert_eq!(ids(&selection), vec!["v1", "v2"]);

        // Deselecting frees a slot.
        let selection = toggle_choice(&poll, &selection, "v1").unwrap();
        let selection = toggle_choice(&poll, &selection, "v3").unwrap();
        assert_eq!(ids(&selection), vec!["v2", "v3"]);
    }

    #[test]
    fn multi_never_exceeds_cap() {
        let variants = ["v1", "v2", "v3", "v4"];
        for max in 1..=4 {
            let poll = Poll::multi_example(max);
            let mut selection = Selection::new();
            // A deterministic but irregular walk over the variants.
            for step in 0..200usize {
                let variant = variants[(step * 7 + step / 3) % variants.len()];
                if let Ok(next) = toggle_choice(&poll, &selection, variant) {
                    selection = next;
                }
                assert!(selection.len() <= max as usize);
            }
        }
    }

    #[test]
    fn submission_rules_in_order() {
        let now = Utc::now();

        let closed = Poll::closed_example();
        assert_eq!(
            validate_submission(&closed, &Selection::new(), now),
            Err(SelectionError::PollClosed)
        );

        let single = Poll::single_example();
        assert_eq!(
            validate_submission(&single, &Selection::new(), now),
            Err(SelectionError::NoSelectionMade)
        );
        let two: Selection = ["v1", "v2"].into_iter().collect();
        assert_eq!(
            validate_submission(&single, &two, now),
            Err(SelectionError::InvalidSelectionCount)
        );

        let multi = Poll::multi_example(2);
        let three: Selection = ["v1", "v2", "v3"].into_iter().collect();
        assert_eq!(
            validate_submission(&multi, &three, now),
            Err(SelectionError::SelectionLimitExceeded(2))
        );
        assert_eq!(validate_submission(&multi, &two, now), Ok(()));
    }

    #[test]
    fn closed_poll_rejects_everything() {
        let now = Utc::now();
        let mut polls = vec![Poll::closed_example(), Poll::multi_example(2)];
        polls[1].deadline = Some(now - Duration::seconds(1));

        let selections: Vec<Selection> = vec![
            Selection::new(),
            Selection::only("v1"),
            ["v1", "v2"].into_iter().collect(),
            ["v1", "v2", "v3", "v4"].into_iter().collect(),
        ];
        for poll in &polls {
            for selection in &selections {
                assert_eq!(
                    validate_submission(poll, selection, now),
                    Err(SelectionError::PollClosed)
                );
            }
        }
    }

    #[test]
    fn percentages_round_half_up() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(5, 0), 0);
        assert_eq!(percentage(1, 2), 50);
        assert_eq!(percentage(1, 8), 13); // 12.5
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(7, 7), 100);
        assert_eq!(percentage(u64::MAX, u64::MAX), 100);
    }

    #[test]
    fn results_scenario() {
        let result = VoteResult::example(&[("A", 57), ("B", 65), ("C", 2)]);
        assert_eq!(result.total, 124);

        let view = compute_result_view(&result);
        let summary: Vec<_> = view
            .rows
            .iter()
            .map(|r| (r.label.as_str(), r.percentage, r.is_winner))
            .collect();
        assert_eq!(
            summary,
            vec![("B", 52, true), ("A", 46, false), ("C", 2, false)]
        );
        assert_eq!(view.winner().map(|r| r.label.as_str()), Some("B"));
    }

    #[test]
    fn ties_keep_variant_order() {
        let result = VoteResult::example(&[("A", 3), ("B", 5), ("C", 3), ("D", 5)]);
        let view = compute_result_view(&result);
        let labels: Vec<_> = view.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["B", "D", "A", "C"]);
        assert_eq!(view.rows.iter().filter(|r| r.is_winner).count(), 1);
    }

    #[test]
    fn no_votes_means_no_winner() {
        let result = VoteResult::example(&[("A", 0), ("B", 0)]);
        let view = compute_result_view(&result);
        assert!(view.winner().is_none());
        assert!(view.rows.iter().all(|r| r.percentage == 0));
    }

    #[test]
    fn result_view_is_idempotent() {
        let result = VoteResult::example(&[("A", 1), ("B", 9), ("C", 4), ("D", 4), ("E", 0)]);
        let first = compute_result_view(&result);

        // Feed the sorted order back in as if the service had returned it.
        let mut resorted = result.clone();
        resorted.results = first
            .rows
            .iter()
            .map(|row| VariantTally {
                id: row.variant_id.clone(),
                label: row.label.clone(),
                count: row.count,
                voters: None,
            })
            .collect();
        let second = compute_result_view(&resorted);

        assert_eq!(first, second);
    }

    #[test]
    fn anonymous_results_hide_voters() {
        let voter = Voter {
            id: "u1".to_string(),
            username: Some("ann".to_string()),
            name: None,
            avatar_url: None,
        };
        let mut result = VoteResult::example(&[("A", 1)]);
        result.results[0].voters = Some(vec![voter.clone()]);

        assert!(compute_result_view(&result).rows[0].voters.is_empty());

        result.is_anonymous = false;
        assert_eq!(compute_result_view(&result).rows[0].voters, vec![voter]);
    }
}
