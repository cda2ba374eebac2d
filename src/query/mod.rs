use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::grade::Grade;
use crate::runner::CatalogError;

pub const BOOKS_API_PATH: &str = "/api/books";

pub const DEFAULT_QUERY_LIMIT: u32 = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiteratureType {
    Fiction,
    Nonfiction,
}

impl LiteratureType {
    pub fn as_str(self) -> &'static str {
        match self {
            LiteratureType::Fiction => "Fiction",
            LiteratureType::Nonfiction => "Nonfiction",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "fiction" => Some(Self::Fiction),
            "nonfiction" | "non-fiction" => Some(Self::Nonfiction),
            _ => None,
        }
    }
}

impl fmt::Display for LiteratureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LiteratureType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LiteratureType::parse(s)
            .ok_or_else(|| format!("unknown literature type '{s}', expected fiction or nonfiction"))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterState {
    pub grades: Option<BTreeSet<Grade>>,
    pub literature_type: Option<LiteratureType>,
    pub lexile_min: Option<i32>,
    pub lexile_max: Option<i32>,
}

impl FilterState {
    pub fn from_raw(
        grades: &[String],
        literature_type: &str,
        lexile_min: &str,
        lexile_max: &str,
    ) -> Result<Self, String> {
        let mut selected = BTreeSet::new();
        for raw in grades.iter().map(|g| g.trim()).filter(|g| !g.is_empty()) {
            selected.insert(raw.parse::<Grade>()?);
        }
        let literature_type = non_empty(literature_type)
            .map(|v| v.parse::<LiteratureType>())
            .transpose()?;
        let lexile_min = parse_lexile_bound("lexile_min", lexile_min)?;
        let lexile_max = parse_lexile_bound("lexile_max", lexile_max)?;
        Ok(Self {
            grades: if selected.is_empty() {
                None
            } else {
                Some(selected)
            },
            literature_type,
            lexile_min,
            lexile_max,
        })
    }

    pub fn selected_grades(&self) -> Vec<Grade> {
        self.grades
            .as_ref()
            .map(|g| g.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn grades_summary(&self) -> String {
        let grades = self.selected_grades();
        if grades.is_empty() {
            return "All Grades".to_string();
        }
        grades.iter().map(|g| g.short_label()).join(", ")
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_lexile_bound(name: &str, value: &str) -> Result<Option<i32>, String> {
    non_empty(value)
        .map(|v| {
            v.parse::<i32>()
                .map_err(|_| format!("invalid {name} '{v}', expected an integer"))
        })
        .transpose()
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuerySpec {
    pub grade_level: Option<Grade>,
    pub literature_type: Option<LiteratureType>,
    pub lexile_min: Option<i32>,
    pub lexile_max: Option<i32>,
    pub limit: Option<u32>,
}

impl QuerySpec {
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(grade) = self.grade_level {
            pairs.push(("grade_level", grade.key().to_string()));
        }
        if let Some(kind) = self.literature_type {
            pairs.push(("literature_type", kind.as_str().to_string()));
        }
        if let Some(min) = self.lexile_min {
            pairs.push(("lexile_min", min.to_string()));
        }
        if let Some(max) = self.lexile_max {
            pairs.push(("lexile_max", max.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }

    pub fn query_string(&self) -> String {
        reqwest::Url::parse_with_params("http://localhost/", self.to_pairs())
            .ok()
            .and_then(|url| url.query().map(|q| q.to_string()))
            .unwrap_or_default()
    }

    pub fn to_url(&self, base: &reqwest::Url) -> Result<reqwest::Url, CatalogError> {
        let mut url = base
            .join(BOOKS_API_PATH)
            .map_err(|_| CatalogError::InvalidBaseUrl {
                url: base.to_string(),
            })?;
        let pairs = self.to_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs.iter());
        }
        Ok(url)
    }
}

pub fn resolve(filters: &FilterState, limit: Option<u32>) -> Vec<QuerySpec> {
    let base = QuerySpec {
        grade_level: None,
        literature_type: filters.literature_type,
        lexile_min: filters.lexile_min,
        lexile_max: filters.lexile_max,
        limit,
    };
    let grades = filters.selected_grades();
    if grades.is_empty() {
        return vec![base];
    }
    grades
        .into_iter()
        .map(|grade| QuerySpec {
            grade_level: Some(grade),
            ..base.clone()
        })
        .collect()
}
