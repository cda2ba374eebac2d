use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::fetcher::RawBookRecord;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CatalogItem {
    pub title: String,
    pub author: String,
    pub grade_levels: Vec<String>,
    pub lexile: String,
    pub literature_type: String,
    pub cover_url: Option<String>,
}

impl CatalogItem {
    fn from_record(title: String, author: String, record: RawBookRecord) -> Self {
        let mut item = CatalogItem {
            title,
            author,
            grade_levels: Vec::new(),
            lexile: record.lexile.unwrap_or_default(),
            literature_type: record.literature_type.unwrap_or_default(),
            cover_url: record.cover_url.filter(|u| !u.trim().is_empty()),
        };
        if let Some(grade) = record.grade_level {
            item.add_grade(grade);
        }
        item
    }

    pub fn add_grade(&mut self, grade: String) {
        if !self.grade_levels.contains(&grade) {
            self.grade_levels.push(grade);
        }
    }

    pub fn primary_grade(&self) -> Option<&str> {
        self.grade_levels.first().map(|g| g.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub input: usize,
    pub unique: usize,
    pub skipped: usize,
}

pub fn merge_records<I>(records: I) -> (Vec<CatalogItem>, MergeStats)
where
    I: IntoIterator<Item = RawBookRecord>,
{
    let mut items: Vec<CatalogItem> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut stats = MergeStats::default();

    for mut record in records {
        stats.input += 1;
        let (title, author) = match (record.title.take(), record.author.take()) {
            (Some(t), Some(a)) if !t.is_empty() && !a.is_empty() => (t, a),
            (t, a) => {
                warn!(
                    title = t.as_deref().unwrap_or(""),
                    author = a.as_deref().unwrap_or(""),
                    "skipping book record without title or author"
                );
                stats.skipped += 1;
                continue;
            }
        };

        match index.entry((title, author)) {
            Entry::Occupied(slot) => {
                if let Some(grade) = record.grade_level {
                    items[*slot.get()].add_grade(grade);
                }
            }
            Entry::Vacant(slot) => {
                let (title, author) = slot.key().clone();
                slot.insert(items.len());
                items.push(CatalogItem::from_record(title, author, record));
            }
        }
    }

    stats.unique = items.len();
    debug!(
        input = stats.input,
        unique = stats.unique,
        skipped = stats.skipped,
        "merged book records"
    );
    (items, stats)
}
