//! 결과 페이지네이션.

use serde::{Deserialize, Serialize};

/// 페이지네이션 메타데이터.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

/// 항목 목록에서 한 페이지를 잘라냅니다.
///
/// `page`는 1부터 시작하며, `limit`이 없으면 전체를 한 페이지로 취급합니다.
pub fn paginate<T>(items: Vec<T>, page: Option<usize>, limit: Option<usize>) -> (Vec<T>, PaginationMeta) {
    let total = items.len();
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(total).max(1);
    let total_pages = total.div_ceil(limit);

    let start = (page - 1).saturating_mul(limit);
    let page_items: Vec<T> = items.into_iter().skip(start).take(limit).collect();

    let meta = PaginationMeta {
        page,
        limit,
        total,
        total_pages,
        has_next: page < total_pages,
        has_prev: page > 1,
    };

    (page_items, meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate_defaults_to_single_page() {
        let (items, meta) = paginate(vec![1, 2, 3], None, None);
        assert_eq!(items, vec![1, 2, 3]);
        assert_eq!(meta.total_pages, 1);
        assert!(!meta.has_next);
        assert!(!meta.has_prev);
    }

    #[test]
    fn test_paginate_middle_page() {
        let (items, meta) = paginate((1..=25).collect::<Vec<_>>(), Some(2), Some(10));
        assert_eq!(items, (11..=20).collect::<Vec<_>>());
        assert_eq!(meta.total, 25);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next);
        assert!(meta.has_prev);
    }

    #[test]
    fn test_paginate_past_end() {
        let (items, meta) = paginate(vec![1, 2], Some(5), Some(10));
        assert!(items.is_empty());
        assert!(!meta.has_next);
    }

    #[test]
    fn test_paginate_empty() {
        let (items, meta) = paginate(Vec::<u8>::new(), None, None);
        assert!(items.is_empty());
        assert_eq!(meta.total, 0);
        assert_eq!(meta.total_pages, 0);
        assert_eq!(meta.limit, 1);
    }
}
