use colored::Colorize;
use itertools::Itertools;

use crate::grade::grade_rank;
use crate::merge::CatalogItem;
use crate::paginator::PageMarker;
use crate::runner::PageSnapshot;

pub const NO_RESULTS_MESSAGE: &str =
    "No books found matching your criteria. Try adjusting your filters.";
pub const LOAD_ERROR_MESSAGE: &str = "Error loading books. Please try again later.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn sorted_grades(item: &CatalogItem) -> Vec<&str> {
    item.grade_levels
        .iter()
        .map(|g| g.as_str())
        .sorted_by_key(|g| grade_rank(g))
        .collect()
}

pub fn results_line(page: &PageSnapshot) -> String {
    let plural = if page.total_items == 1 { "" } else { "s" };
    format!(
        "Showing {}-{} of {} book{}",
        page.first_index, page.last_index, page.total_items, plural
    )
}

pub fn pagination_line(page: &PageSnapshot) -> String {
    page.markers
        .iter()
        .map(|m| match m {
            PageMarker::Page(n) if *n == page.current_page => format!("[{n}]"),
            PageMarker::Page(n) => n.to_string(),
            PageMarker::Ellipsis => "...".to_string(),
        })
        .join(" ")
}

fn render_card(item: &CatalogItem, out: &mut String) {
    out.push_str(&format!("{}\n", item.title.bold().white()));
    out.push_str(&format!("  by {}\n", item.author));
    let grades = sorted_grades(item)
        .into_iter()
        .map(|g| format!("[{}]", g.cyan()))
        .join(" ");
    let lexile = format!("Lexile: {}", item.lexile);
    let kind = if item.literature_type == "Fiction" {
        item.literature_type.green()
    } else {
        item.literature_type.blue()
    };
    out.push_str(&format!("  {} {} {}\n", grades, lexile.yellow(), kind));
    if let Some(cover) = item.cover_url.as_deref() {
        out.push_str(&format!("  cover: {}\n", cover.dimmed()));
    }
}

pub fn render_text(page: &PageSnapshot) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        ":: {:<10}: {}\n",
        "Grades",
        page.filters.grades_summary()
    ));
    if let Some(kind) = page.filters.literature_type {
        out.push_str(&format!(":: {:<10}: {}\n", "Type", kind));
    }
    if page.filters.lexile_min.is_some() || page.filters.lexile_max.is_some() {
        let bound = |v: Option<i32>| v.map(|v| v.to_string()).unwrap_or_else(|| "*".to_string());
        out.push_str(&format!(
            ":: {:<10}: {}-{}\n",
            "Lexile",
            bound(page.filters.lexile_min),
            bound(page.filters.lexile_max)
        ));
    }
    out.push_str(&format!(":: {:<10}: {}\n", "Sort", page.sort));
    out.push('\n');

    if page.is_empty() {
        out.push_str(&format!("{}\n", NO_RESULTS_MESSAGE.bold().red()));
        return out;
    }

    out.push_str(&format!("{}\n\n", results_line(page).bold()));
    for item in &page.items {
        render_card(item, &mut out);
        out.push('\n');
    }

    if page.total_pages > 1 {
        out.push_str(&format!(
            "{}\n{}\n",
            pagination_line(page),
            format!("Page {} of {}", page.current_page, page.total_pages).dimmed()
        ));
    }
    out
}

pub fn render_json(page: &PageSnapshot) -> Vec<u8> {
    serde_json::to_vec_pretty(page).unwrap_or_else(|_| b"{}\n".to_vec())
}

pub fn render(page: &PageSnapshot, format: OutputFormat) -> Vec<u8> {
    match format {
        OutputFormat::Text => render_text(page).into_bytes(),
        OutputFormat::Json => {
            let mut out = render_json(page);
            out.push(b'\n');
            out
        }
    }
}
