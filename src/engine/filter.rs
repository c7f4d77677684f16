use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::package::{Package, PackageStatus};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Category {
    #[default]
    All,
    Active,
    Delivered,
    Cancelled,
    /// Inclusive on both ends.
    DateRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Clone, Default)]
pub struct PackageQuery {
    pub search: Option<String>,
    pub category: Category,
    pub sort: SortOrder,
}

/// Applies the tracking-code search, then the category, then sorts by
/// creation date. The sort is stable.
pub fn apply(packages: &[Package], query: &PackageQuery) -> Vec<Package> {
    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|search| !search.is_empty())
        .map(str::to_lowercase);

    let mut result: Vec<Package> = packages
        .iter()
        .filter(|package| match &needle {
            Some(needle) => package.tracking_code.to_lowercase().contains(needle.as_str()),
            None => true,
        })
        .filter(|package| matches_category(package, &query.category))
        .cloned()
        .collect();

    match query.sort {
        SortOrder::Ascending => result.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        SortOrder::Descending => result.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }

    result
}

fn matches_category(package: &Package, category: &Category) -> bool {
    match category {
        Category::All => true,
        Category::Active => !package.status.is_terminal(),
        Category::Delivered => package.status == PackageStatus::Delivered,
        Category::Cancelled => package.cancelled,
        Category::DateRange { start, end } => {
            package.created_at >= *start && package.created_at <= *end
        }
    }
}
