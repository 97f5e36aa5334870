use serde::Deserialize;

use crate::models::job_listing::{JobListing, RemoteType};

/// Search filters. Every present field narrows the result (AND semantics);
/// only live listings are ever considered.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingSearch {
    pub keyword: Option<String>,
    pub location: Option<String>,
    pub remote_type: Option<RemoteType>,
    pub employer_id: Option<i64>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub job_type: Option<String>,
    pub experience_level: Option<String>,
}

impl ListingSearch {
    /// Blank strings coming from query strings mean "no filter".
    pub fn normalized(mut self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        self.keyword = clean(self.keyword);
        self.location = clean(self.location);
        self.job_type = clean(self.job_type);
        self.experience_level = clean(self.experience_level);
        self
    }

    /// In-process evaluation of the filter. The Postgres backend expresses the
    /// same predicate in SQL.
    pub fn matches(&self, listing: &JobListing) -> bool {
        if !listing.is_live() {
            return false;
        }

        if let Some(keyword) = &self.keyword {
            let needle = keyword.to_lowercase();
            let in_title = listing.title.to_lowercase().contains(&needle);
            let in_description = listing.description.to_lowercase().contains(&needle);
            if !in_title && !in_description {
                return false;
            }
        }

        if let Some(location) = &self.location {
            let needle = location.to_lowercase();
            let hit = listing
                .location
                .as_deref()
                .map(|l| l.to_lowercase().contains(&needle))
                .unwrap_or(false);
            if !hit {
                return false;
            }
        }

        if let Some(remote_type) = self.remote_type {
            if listing.remote_type != remote_type {
                return false;
            }
        }

        if let Some(employer_id) = self.employer_id {
            if listing.employer_id != employer_id {
                return false;
            }
        }

        if let Some(min) = self.salary_min {
            if !listing.salary_min.is_some_and(|v| v >= min) {
                return false;
            }
        }

        if let Some(max) = self.salary_max {
            if !listing.salary_max.is_some_and(|v| v <= max) {
                return false;
            }
        }

        if let Some(job_type) = &self.job_type {
            if listing.job_type.as_deref() != Some(job_type.as_str()) {
                return false;
            }
        }

        if let Some(level) = &self.experience_level {
            if listing.experience_level.as_deref() != Some(level.as_str()) {
                return false;
            }
        }

        true
    }
}

/// Escapes LIKE wildcards so user input is matched literally.
pub fn like_pattern(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len() + 2);
    escaped.push('%');
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job_listing::{JobListingDraft, NewJobListing};
    use chrono::Utc;

    fn listing(salary_min: Option<f64>, salary_max: Option<f64>) -> JobListing {
        let draft = JobListingDraft {
            title: "Senior Rust Engineer".to_string(),
            description: "Build storage engines".to_string(),
            location: Some("Berlin, Germany".to_string()),
            job_type: Some("full_time".to_string()),
            experience_level: Some("senior".to_string()),
            remote_type: Some(RemoteType::Hybrid),
            salary_min,
            salary_max,
            ..Default::default()
        };
        NewJobListing::from_draft(3, draft, Utc::now()).into_listing(1)
    }

    #[test]
    fn test_empty_filter_matches_live_listing() {
        assert!(ListingSearch::default().matches(&listing(None, None)));
    }

    #[test]
    fn test_keyword_is_case_insensitive_over_title_and_description() {
        let l = listing(None, None);
        let by_title = ListingSearch {
            keyword: Some("rust".into()),
            ..Default::default()
        };
        let by_description = ListingSearch {
            keyword: Some("STORAGE".into()),
            ..Default::default()
        };
        let miss = ListingSearch {
            keyword: Some("golang".into()),
            ..Default::default()
        };
        assert!(by_title.matches(&l));
        assert!(by_description.matches(&l));
        assert!(!miss.matches(&l));
    }

    #[test]
    fn test_salary_min_filter() {
        let filter = ListingSearch {
            salary_min: Some(60_000.0),
            ..Default::default()
        };
        assert!(!filter.matches(&listing(Some(50_000.0), None)));
        assert!(filter.matches(&listing(Some(70_000.0), None)));
        assert!(!filter.matches(&listing(None, None)));
    }

    #[test]
    fn test_salary_max_filter() {
        let filter = ListingSearch {
            salary_max: Some(90_000.0),
            ..Default::default()
        };
        assert!(filter.matches(&listing(None, Some(85_000.0))));
        assert!(!filter.matches(&listing(None, Some(95_000.0))));
    }

    #[test]
    fn test_filters_combine_with_and() {
        let filter = ListingSearch {
            location: Some("berlin".into()),
            remote_type: Some(RemoteType::FullyRemote),
            ..Default::default()
        };
        assert!(!filter.matches(&listing(None, None)));
    }

    #[test]
    fn test_soft_deleted_and_inactive_never_match() {
        let mut deleted = listing(None, None);
        deleted.deleted_at = Some(Utc::now());
        let mut inactive = listing(None, None);
        inactive.status = "inactive".into();
        let filter = ListingSearch {
            keyword: Some("rust".into()),
            ..Default::default()
        };
        assert!(!filter.matches(&deleted));
        assert!(!filter.matches(&inactive));
    }

    #[test]
    fn test_normalized_drops_blank_strings() {
        let filter = ListingSearch {
            keyword: Some("   ".into()),
            location: Some(" Berlin ".into()),
            ..Default::default()
        }
        .normalized();
        assert!(filter.keyword.is_none());
        assert_eq!(filter.location.as_deref(), Some("Berlin"));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern("100%_"), "%100\\%\\_%");
    }
}
