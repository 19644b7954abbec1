use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::model::{PollId, UserId, VariantId};

/// Aggregate results for one poll, as supplied by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResult {
    pub poll_id: PollId,
    /// Votes cast across all variants.
    pub total: u64,
    /// Per-variant tallies, in the poll's variant order.
    pub results: Vec<VariantTally>,
    pub is_anonymous: bool,
    /// Distinct users who voted.
    pub total_voters: u64,
    /// Percentage of the electorate that voted.
    pub participation_rate: f64,
}

/// The tally for a single variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantTally {
    pub id: VariantId,
    pub label: String,
    pub count: u64,
    /// Who voted for this variant. Only present for public polls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voters: Option<Vec<Voter>>,
}

/// A voter revealed by a public poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voter {
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Voter {
    /// Username, else name, else a placeholder.
    pub fn display_name(&self) -> &str {
        non_blank(&self.username)
            .or_else(|| non_blank(&self.name))
            .unwrap_or("?")
    }

    /// Up to two uppercase characters taken from the name, else the username.
    pub fn initials(&self) -> String {
        non_blank(&self.name)
            .or_else(|| non_blank(&self.username))
            .map(|s| s.chars().take(2).flat_map(char::to_uppercase).collect())
            .unwrap_or_else(|| "?".to_string())
    }
}

fn non_blank(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// A display-ready view of a poll's results; see [`crate::engine::compute_result_view`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub poll_id: PollId,
    pub total: u64,
    pub total_voters: u64,
    pub participation_rate: f64,
    pub is_anonymous: bool,
    /// Rows ordered by descending count, ties in variant order.
    pub rows: Vec<ResultRow>,
}

impl ResultView {
    /// The leading variant, if any votes were cast.
    pub fn winner(&self) -> Option<&ResultRow> {
        self.rows.iter().find(|row| row.is_winner)
    }
}

/// One line of the results table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    pub variant_id: VariantId,
    pub label: String,
    pub count: u64,
    /// Whole-number share of all votes, rounded half-up.
    pub percentage: u64,
    pub is_winner: bool,
    /// Empty for anonymous polls.
    pub voters: Vec<Voter>,
}

impl Display for ResultRow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} vote{} ({}%){}",
            self.label,
            self.count,
            if self.count != 1 { "s" } else { "" },
            self.percentage,
            if self.is_winner { " [winner]" } else { "" }
        )
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decode_public_results() {
        let result: VoteResult = serde_json::from_value(json!({
            "pollId": "p1",
            "total": 3,
            "results": [
                {"id": "a", "label": "A", "count": 2, "voters": [
                    {"id": "u1", "username": "ann", "name": "Ann", "avatarUrl": null},
                    {"id": "u2", "username": null, "name": "bob"}
                ]},
                {"id": "b", "label": "B", "count": 1, "voters": []}
            ],
            "isAnonymous": false,
            "totalVoters": 2,
            "participationRate": 100.0
        }))
        .unwrap();

        assert_eq!(result.total, 3);
        let voters = result.results[0].voters.as_ref().unwrap();
        assert_eq!(voters[0].display_name(), "ann");
        assert_eq!(voters[1].display_name(), "bob");
        assert_eq!(voters[1].initials(), "BO");
    }

    #[test]
    fn voter_fallbacks() {
        let voter = Voter {
            id: "u".to_string(),
            username: Some("  ".to_string()),
            name: None,
            avatar_url: None,
        };
        assert_eq!(voter.display_name(), "?");
        assert_eq!(voter.initials(), "?");

        let voter = Voter {
            username: Some("zoë".to_string()),
            ..voter
        };
        assert_eq!(voter.initials(), "ZO");
    }

    #[test]
    fn row_display() {
        let row = ResultRow {
            variant_id: "b".to_string(),
            label: "B".to_string(),
            count: 1,
            percentage: 50,
            is_winner: true,
            voters: Vec::new(),
        };
        assert_eq!(row.to_string(), "B: 1 vote (50%) [winner]");
    }
}
