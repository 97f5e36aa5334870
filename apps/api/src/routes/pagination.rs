use serde::Serialize;

use crate::config::Config;
use crate::store::{Page, Paged};

/// 1-based page number and page size resolved from query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    /// Missing values fall back to page 1 and the configured default size;
    /// oversized limits are clamped.
    pub fn resolve(page: Option<i64>, limit: Option<i64>, config: &Config) -> Self {
        Pagination {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(config.default_page_size)
                .clamp(1, config.max_page_size),
        }
    }

    pub fn window(&self) -> Page {
        Page::new((self.page - 1).saturating_mul(self.limit), self.limit)
    }

    pub fn respond<T>(&self, paged: Paged<T>) -> PagedResponse<T> {
        let total_pages = if paged.total == 0 {
            0
        } else {
            (paged.total + self.limit - 1) / self.limit
        };
        PagedResponse {
            data: paged.rows,
            meta: PageMeta {
                total: paged.total,
                page: self.page,
                limit: self.limit,
                total_pages,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PagedResponse<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults_and_clamps() {
        let config = Config::default();
        assert_eq!(
            Pagination::resolve(None, None, &config),
            Pagination { page: 1, limit: 10 }
        );
        assert_eq!(
            Pagination::resolve(Some(0), Some(5000), &config),
            Pagination {
                page: 1,
                limit: 100
            }
        );
    }

    #[test]
    fn test_window_and_meta() {
        let p = Pagination { page: 3, limit: 20 };
        assert_eq!(p.window(), Page::new(40, 20));

        let response = p.respond(Paged {
            rows: vec![1, 2],
            total: 41,
        });
        assert_eq!(response.meta.total_pages, 3);
        assert_eq!(response.data, vec![1, 2]);
    }
}
