use crate::core::search::SearchError;

/// Build a GitHub user-search query from a free-text requirement
///
/// Output follows the search filter syntax:
/// `<terms> type:user [location:<loc>] [language:<lang>]`
///
/// Filter values containing whitespace are quoted so the provider reads them
/// as a single qualifier value. Blank filters are ignored.
pub fn build_query(
    requirement: &str,
    location: Option<&str>,
    language: Option<&str>,
) -> Result<String, SearchError> {
    let terms = normalize_whitespace(requirement);
    if terms.is_empty() {
        return Err(SearchError::InvalidRequest(
            "requirement must not be empty".to_string(),
        ));
    }

    let mut query = format!("{} type:user", terms);

    if let Some(loc) = location.and_then(qualifier_value) {
        query.push_str(" location:");
        query.push_str(&loc);
    }
    if let Some(lang) = language.and_then(qualifier_value) {
        query.push_str(" language:");
        query.push_str(&lang);
    }

    Ok(query)
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[inline]
fn qualifier_value(raw: &str) -> Option<String> {
    let value = normalize_whitespace(&raw.replace('"', ""));
    if value.is_empty() {
        None
    } else if value.contains(' ') {
        Some(format!("\"{}\"", value))
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirement_only() {
        let q = build_query("rust developer", None, None).unwrap();
        assert_eq!(q, "rust developer type:user");
    }

    #[test]
    fn test_with_filters() {
        let q = build_query("  machine   learning ", Some("Berlin"), Some("python")).unwrap();
        assert_eq!(q, "machine learning type:user location:Berlin language:python");
    }

    #[test]
    fn test_quotes_multi_word_location() {
        let q = build_query("backend", Some("San Francisco"), None).unwrap();
        assert_eq!(q, "backend type:user location:\"San Francisco\"");
    }

    #[test]
    fn test_blank_filters_ignored() {
        let q = build_query("go", Some("   "), Some("")).unwrap();
        assert_eq!(q, "go type:user");
    }

    #[test]
    fn test_empty_requirement_rejected() {
        assert!(matches!(
            build_query("", None, None),
            Err(SearchError::InvalidRequest(_))
        ));
        assert!(matches!(
            build_query(" \t\n", Some("Paris"), None),
            Err(SearchError::InvalidRequest(_))
        ));
    }
}
