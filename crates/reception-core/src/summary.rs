//! Admin dashboard figures, computed client-side from a snapshot.

use std::collections::HashSet;

use crate::models::Category;
use crate::store::Snapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySummary {
    pub category: Category,
    /// Number of submissions. Students submitted together count once.
    pub receptions: usize,
    /// Number of people. Students count per record, groups by `count`.
    pub headcount: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub categories: Vec<CategorySummary>,
    pub total_visitors: u32,
    pub total_receptions: usize,
    pub members_checked_in: usize,
    pub log_entries: usize,
}

impl Summary {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let visitors = &snapshot.visitors;
        let categories: Vec<CategorySummary> = Category::ALL
            .iter()
            .map(|&category| {
                let receptions = if category.collects_per_person() {
                    visitors
                        .students
                        .iter()
                        .map(|s| s.timestamp.as_str())
                        .collect::<HashSet<_>>()
                        .len()
                } else {
                    visitors.len(category)
                };
                CategorySummary {
                    category,
                    receptions,
                    headcount: visitors.headcount(category),
                }
            })
            .collect();

        Self {
            total_visitors: categories.iter().map(|c| c.headcount).sum(),
            total_receptions: categories.iter().map(|c| c.receptions).sum(),
            categories,
            members_checked_in: snapshot.member_status.checked_in_count(),
            log_entries: snapshot.member_log.len(),
        }
    }

    pub fn for_category(&self, category: Category) -> Option<&CategorySummary> {
        self.categories.iter().find(|c| c.category == category)
    }
}
