//! Profile scoring — compatibility between two declared profiles.
//!
//! Three independent components, summed then rounded:
//!   interests  up to 35, proportional to the shared share of the longer list
//!   city       35 when both cities match
//!   college    30 when both colleges are present and match
//!
//! Comparisons are case-insensitive and ignore surrounding whitespace.
//! Missing optional fields contribute 0; nothing here can fail.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub const INTEREST_WEIGHT: f64 = 35.0;
pub const CITY_WEIGHT: f64 = 35.0;
pub const COLLEGE_WEIGHT: f64 = 30.0;

/// Minimum score a profiled match must reach to be accepted.
pub const MATCH_THRESHOLD: u8 = 40;

/// Self-declared profile submitted with a profiled match request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub college: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub interests: Vec<String>,
}

impl Profile {
    pub fn new(city: impl Into<String>, interests: &[&str]) -> Self {
        Self {
            college: None,
            city: city.into(),
            interests: interests.iter().map(|i| i.to_string()).collect(),
        }
    }

    pub fn with_college(mut self, college: impl Into<String>) -> Self {
        self.college = Some(college.into());
        self
    }

    /// A profile takes part in profiled matching only with a city and at
    /// least one interest.
    pub fn is_valid(&self) -> bool {
        !self.city.trim().is_empty() && !self.interests.is_empty()
    }

    /// Why the profile is rejected, if it is.
    pub fn validation_error(&self) -> Option<&'static str> {
        if self.city.trim().is_empty() {
            Some("city is required")
        } else if self.interests.is_empty() {
            Some("at least one interest is required")
        } else {
            None
        }
    }
}

/// Result of scoring two profiles against each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchScore {
    /// 0..=100
    pub value: u8,
    /// Shared interests, spelled as in the first profile.
    pub common_interests: Vec<String>,
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

fn same_text(a: &str, b: &str) -> bool {
    let a = normalize(a);
    !a.is_empty() && a == normalize(b)
}

/// Interests of `a` that also appear in `b`, first spelling wins.
pub fn common_interests(a: &[String], b: &[String]) -> Vec<String> {
    let theirs: HashSet<String> = b.iter().map(|i| normalize(i)).collect();
    let mut seen = HashSet::new();
    a.iter()
        .filter(|i| {
            let key = normalize(i);
            !key.is_empty() && theirs.contains(&key) && seen.insert(key)
        })
        .cloned()
        .collect()
}

/// Score `a` against `b`. Symmetric in `value`.
pub fn score(a: &Profile, b: &Profile) -> MatchScore {
    let common = common_interests(&a.interests, &b.interests);

    let mut total = 0.0;

    let longest = a.interests.len().max(b.interests.len());
    if !a.interests.is_empty() && !b.interests.is_empty() && !common.is_empty() {
        total += (common.len() as f64 / longest as f64) * INTEREST_WEIGHT;
    }

    if same_text(&a.city, &b.city) {
        total += CITY_WEIGHT;
    }

    if let (Some(ca), Some(cb)) = (&a.college, &b.college) {
        if same_text(ca, cb) {
            total += COLLEGE_WEIGHT;
        }
    }

    MatchScore {
        value: total.round().clamp(0.0, 100.0) as u8,
        common_interests: common,
    }
}

/// Human-readable facts two matched profiles share. Each field is present
/// only when it applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_college: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub common_interests: Vec<String>,
}

impl MatchSummary {
    pub fn describe(requester: &Profile, partner: &Profile, common: &[String]) -> Self {
        let same_city = same_text(&requester.city, &partner.city)
            .then(|| format!("You are both from {}!", requester.city.trim()));

        let same_college = match (&requester.college, &partner.college) {
            (Some(a), Some(b)) if same_text(a, b) => {
                Some(format!("You both study/work at {}!", a.trim()))
            }
            _ => None,
        };

        Self {
            same_city,
            same_college,
            common_interests: common.to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.same_city.is_none() && self.same_college.is_none() && self.common_interests.is_empty()
    }
}
