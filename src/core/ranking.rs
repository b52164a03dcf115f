use crate::models::CandidateRecord;

/// Order scored candidates best first
///
/// `sort_by` is stable, so equal scores keep their aggregation order.
pub fn rank_candidates(mut records: Vec<CandidateRecord>) -> Vec<CandidateRecord> {
    records.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScrapedProfile, StructuredProfile};

    fn create_candidate(login: &str, score: f64) -> CandidateRecord {
        CandidateRecord::merge(
            StructuredProfile {
                login: login.to_string(),
                display_name: login.to_string(),
                bio: None,
                location: None,
                public_repo_count: 0,
                follower_count: 0,
                languages: vec![],
                profile_url: format!("https://github.com/{}", login),
            },
            ScrapedProfile::default(),
        )
        .scored(score, vec![])
    }

    #[test]
    fn test_sorted_descending() {
        let ranked = rank_candidates(vec![
            create_candidate("low", 10.0),
            create_candidate("high", 90.0),
            create_candidate("mid", 50.0),
        ]);
        let logins: Vec<_> = ranked.iter().map(|r| r.login.as_str()).collect();
        assert_eq!(logins, vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_ties_keep_aggregation_order() {
        let ranked = rank_candidates(vec![
            create_candidate("first", 42.5),
            create_candidate("top", 99.0),
            create_candidate("second", 42.5),
            create_candidate("third", 42.5),
        ]);
        let logins: Vec<_> = ranked.iter().map(|r| r.login.as_str()).collect();
        assert_eq!(logins, vec!["top", "first", "second", "third"]);
    }

    #[test]
    fn test_empty_batch() {
        assert!(rank_candidates(vec![]).is_empty());
    }
}
