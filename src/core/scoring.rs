use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::{CandidateRecord, ScoringWeights};

/// Calculate a candidate score (0-100) against the requirement text
///
/// Components, in explanation order:
/// 1. Bio keyword overlap     - keyword_points per shared term
/// 2. Language diversity      - min(languages × language_points, language_cap)
/// 3. Contribution volume     - min(contributions / contribution_divisor, contribution_cap)
/// 4. Repository count        - min(repos × repo_points, repo_cap)
/// 5. Follower count          - min(followers / follower_divisor, follower_cap)
/// 6. Bio present             - bio_bonus
/// 7. Location present        - location_bonus
/// 8. Pinned repositories     - min(pinned / expected_pinned, 1) × pinned_cap
///
/// The sum is clamped to [0, 100] and rounded to 2 decimals. The explanation
/// lists every non-zero component as `"<label> (+<points>)"`.
pub fn score_candidate(
    record: &CandidateRecord,
    requirement: &str,
    weights: &ScoringWeights,
) -> (f64, Vec<String>) {
    let mut total = 0.0;
    let mut explanation = Vec::new();

    let mut add = |label: String, points: f64| {
        let points = round2(points.max(0.0));
        if points > 0.0 {
            total += points;
            explanation.push(format!("{} (+{})", label, format_points(points)));
        }
    };

    let shared = keyword_overlap(requirement, record.bio.as_deref());
    add(
        format!("Bio matches {} key terms", shared),
        shared as f64 * weights.keyword_points,
    );

    let language_count = record.languages.len();
    add(
        format!("Uses {} languages", language_count),
        capped(language_count as f64 * weights.language_points, weights.language_cap),
    );

    add(
        format!("Has {} contributions", record.contribution_count),
        capped(
            ratio(record.contribution_count as f64, weights.contribution_divisor),
            weights.contribution_cap,
        ),
    );

    add(
        format!("Has {} public repos", record.public_repo_count),
        capped(record.public_repo_count as f64 * weights.repo_points, weights.repo_cap),
    );

    add(
        format!("Has {} followers", record.follower_count),
        capped(
            ratio(record.follower_count as f64, weights.follower_divisor),
            weights.follower_cap,
        ),
    );

    if has_text(record.bio.as_deref()) {
        add("Has a bio".to_string(), weights.bio_bonus);
    }
    if has_text(record.location.as_deref()) {
        add("Has a location".to_string(), weights.location_bonus);
    }

    let pinned = record.pinned_items.len();
    add(
        format!("Has {} pinned repositories", pinned),
        ratio(pinned as f64, weights.expected_pinned).min(1.0) * weights.pinned_cap,
    );

    (round2(total.clamp(0.0, 100.0)), explanation)
}

/// Score a record and return it finalized
pub fn score_record(
    record: CandidateRecord,
    requirement: &str,
    weights: &ScoringWeights,
) -> CandidateRecord {
    let (score, explanation) = score_candidate(&record, requirement, weights);
    record.scored(score, explanation)
}

/// Number of distinct lowercase terms shared by the requirement and the bio
pub fn keyword_overlap(requirement: &str, bio: Option<&str>) -> usize {
    let Some(bio) = bio.filter(|b| !b.trim().is_empty()) else {
        return 0;
    };
    let wanted = tokenize(requirement);
    tokenize(bio).intersection(&wanted).count()
}

/// Lowercase `\w+` runs as a set
pub fn tokenize(text: &str) -> HashSet<String> {
    static WORD: OnceLock<Regex> = OnceLock::new();
    let word = WORD.get_or_init(|| Regex::new(r"\w+").expect("static word pattern"));
    let lower = text.to_lowercase();
    word.find_iter(&lower).map(|m| m.as_str().to_string()).collect()
}

/// Round to 2 decimal places
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[inline]
fn capped(value: f64, cap: f64) -> f64 {
    value.min(cap)
}

#[inline]
fn ratio(value: f64, divisor: f64) -> f64 {
    if divisor <= 0.0 {
        return 0.0;
    }
    value / divisor
}

#[inline]
fn has_text(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

fn format_points(points: f64) -> String {
    if points.fract() == 0.0 {
        format!("{}", points as i64)
    } else {
        format!("{:.2}", points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LanguageUsage, ScrapedProfile, StructuredProfile};

    fn create_test_record(bio: Option<&str>) -> CandidateRecord {
        CandidateRecord::merge(
            StructuredProfile {
                login: "octo".to_string(),
                display_name: "Octo Cat".to_string(),
                bio: bio.map(str::to_string),
                location: Some("Remote".to_string()),
                public_repo_count: 40,
                follower_count: 1500,
                languages: vec![
                    LanguageUsage { name: "Python".to_string(), weight: 500 },
                    LanguageUsage { name: "JavaScript".to_string(), weight: 50 },
                ],
                profile_url: "https://github.com/octo".to_string(),
            },
            ScrapedProfile {
                contribution_count: 1200,
                pinned_items: (0..6).map(|i| format!("repo-{}", i)).collect(),
                contribution_streak: "1,200 contributions in the last year".to_string(),
            },
        )
    }

    #[test]
    fn test_full_profile_clamps_to_100() {
        let record = create_test_record(Some("I build machine learning systems in Python"));
        let (score, explanation) =
            score_candidate(&record, "python machine learning", &ScoringWeights::default());

        assert_eq!(score, 100.0);
        assert_eq!(
            explanation,
            vec![
                "Bio matches 3 key terms (+30)",
                "Uses 2 languages (+10)",
                "Has 1200 contributions (+25)",
                "Has 40 public repos (+20)",
                "Has 1500 followers (+15)",
                "Has a bio (+5)",
                "Has a location (+5)",
                "Has 6 pinned repositories (+10)",
            ]
        );
    }

    #[test]
    fn test_empty_bio_has_no_keyword_points() {
        assert_eq!(keyword_overlap("python machine learning", None), 0);
        assert_eq!(keyword_overlap("python machine learning", Some("   ")), 0);

        let record = create_test_record(None);
        let (_, explanation) =
            score_candidate(&record, "python", &ScoringWeights::default());
        assert!(explanation.iter().all(|line| !line.starts_with("Bio matches")));
        assert!(explanation.iter().all(|line| line != "Has a bio (+5)"));
    }

    #[test]
    fn test_fractional_points_formatting() {
        let mut record = create_test_record(None);
        record.contribution_count = 50;
        record.follower_count = 0;
        record.pinned_items.truncate(1);
        let (score, explanation) = score_candidate(&record, "", &ScoringWeights::default());

        assert!(explanation.contains(&"Has 50 contributions (+1.25)".to_string()));
        assert!(explanation.contains(&"Has 1 pinned repositories (+1.67)".to_string()));
        assert!(explanation.iter().all(|line| !line.contains("followers")));
        assert_eq!(score, round2(score));
    }

    #[test]
    fn test_tokenize_lowercases_and_dedups() {
        let tokens = tokenize("Rust, rust; RUST_lang and Go!");
        assert!(tokens.contains("rust"));
        assert!(tokens.contains("rust_lang"));
        assert!(tokens.contains("go"));
        assert_eq!(tokens.len(), 4);
    }

    #[test]
    fn test_zero_divisor_contributes_nothing() {
        let record = create_test_record(None);
        let weights = ScoringWeights {
            contribution_divisor: 0.0,
            ..ScoringWeights::default()
        };
        let (_, explanation) = score_candidate(&record, "", &weights);
        assert!(explanation.iter().all(|line| !line.contains("contributions")));
    }
}
