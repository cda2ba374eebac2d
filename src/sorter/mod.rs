use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::grade::{grade_rank, UNMAPPED_GRADE_RANK};
use crate::merge::CatalogItem;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortField {
    Title,
    Author,
    Grade,
    Lexile,
    Type,
}

impl SortField {
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::Title => "title",
            SortField::Author => "author",
            SortField::Grade => "grade",
            SortField::Lexile => "lexile",
            SortField::Type => "type",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortKey {
    pub const fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }
}

impl Default for SortKey {
    fn default() -> Self {
        Self::new(SortField::Title, SortOrder::Asc)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = match self.order {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        };
        write!(f, "{}-{}", self.field.as_str(), order)
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_ascii_lowercase();
        let (field, order) = raw
            .split_once('-')
            .ok_or_else(|| format!("invalid sort '{s}', expected FIELD-ORDER (e.g. title-asc)"))?;
        let field = match field {
            "title" => SortField::Title,
            "author" => SortField::Author,
            "grade" => SortField::Grade,
            "lexile" => SortField::Lexile,
            "type" => SortField::Type,
            other => {
                return Err(format!(
                    "invalid sort field '{other}', expected title, author, grade, lexile or type"
                ))
            }
        };
        let order = match order {
            "asc" => SortOrder::Asc,
            "desc" => SortOrder::Desc,
            other => return Err(format!("invalid sort order '{other}', expected asc or desc")),
        };
        Ok(SortKey { field, order })
    }
}

impl Serialize for SortKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn last_name(author: &str) -> &str {
    let trimmed = author.trim();
    trimmed.rsplit(' ').next().unwrap_or(trimmed)
}

fn leading_int_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([+-]?\d+)").expect("static regex compiles"))
}

// BR is -1, otherwise the leading integer (saturating), or 0 when there is none.
pub fn lexile_value(lexile: &str) -> i64 {
    if lexile.trim().eq_ignore_ascii_case("br") {
        return -1;
    }
    leading_int_re()
        .captures(lexile)
        .map(|c| {
            let digits = &c[1];
            digits.parse::<i64>().unwrap_or(if digits.starts_with('-') {
                i64::MIN
            } else {
                i64::MAX
            })
        })
        .unwrap_or(0)
}

fn compare_by(field: SortField, a: &CatalogItem, b: &CatalogItem) -> Ordering {
    match field {
        SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        SortField::Author => last_name(&a.author)
            .to_lowercase()
            .cmp(&last_name(&b.author).to_lowercase()),
        SortField::Grade => {
            let rank = |item: &CatalogItem| {
                item.primary_grade()
                    .map(grade_rank)
                    .unwrap_or(UNMAPPED_GRADE_RANK)
            };
            rank(a).cmp(&rank(b))
        }
        SortField::Lexile => lexile_value(&a.lexile).cmp(&lexile_value(&b.lexile)),
        SortField::Type => a
            .literature_type
            .to_lowercase()
            .cmp(&b.literature_type.to_lowercase()),
    }
}

pub fn compare(key: SortKey, a: &CatalogItem, b: &CatalogItem) -> Ordering {
    let ord = compare_by(key.field, a, b);
    match key.order {
        SortOrder::Asc => ord,
        SortOrder::Desc => ord.reverse(),
    }
}

pub fn sort_items(items: &[CatalogItem], key: SortKey) -> Vec<CatalogItem> {
    let mut sorted = items.to_vec();
    sort_in_place(&mut sorted, key);
    sorted
}

pub fn sort_in_place(items: &mut [CatalogItem], key: SortKey) {
    items.sort_by(|a, b| compare(key, a, b));
}
