use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use crate::fetcher::{self, decode_envelope, BookSource, RawBookRecord};
use crate::grade::Grade;
use crate::output;
use crate::query::{self, FilterState, LiteratureType, QuerySpec};
use crate::runner::{Catalog, CatalogError, LoadOutcome, Options, PageSnapshot, PageView};
use crate::sorter::{SortField, SortKey, SortOrder};

#[derive(Default)]
struct FakeSource {
    responses: HashMap<Option<Grade>, (u16, String)>,
    waits: HashMap<Option<Grade>, Arc<Notify>>,
    signals: HashMap<Option<Grade>, Arc<Notify>>,
    seen: Mutex<Vec<QuerySpec>>,
}

impl FakeSource {
    fn respond(mut self, grade: Option<Grade>, status: u16, body: String) -> Self {
        self.responses.insert(grade, (status, body));
        self
    }

    fn books(self, grade: Option<Grade>, books: Vec<serde_json::Value>) -> Self {
        self.respond(grade, 200, json!({ "success": true, "data": books }).to_string())
    }

    fn seen(&self) -> Vec<QuerySpec> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl BookSource for FakeSource {
    async fn fetch(&self, query: &QuerySpec) -> Result<Vec<RawBookRecord>, CatalogError> {
        self.seen.lock().unwrap().push(query.clone());
        if let Some(gate) = self.waits.get(&query.grade_level) {
            gate.notified().await;
        }
        let (status, body) = self
            .responses
            .get(&query.grade_level)
            .cloned()
            .unwrap_or((200, r#"{"success":true,"data":[]}"#.to_string()));
        let decoded = decode_envelope(status, body.as_bytes());
        if let Some(signal) = self.signals.get(&query.grade_level) {
            signal.notify_one();
        }
        decoded
    }
}

fn book(title: &str, author: &str, grade: &str, lexile: &str) -> serde_json::Value {
    json!({
        "title": title,
        "author": author,
        "grade_level": grade,
        "lexile": lexile,
        "literature_type": "Fiction",
        "cover_url": null,
    })
}

fn numbered_books(count: usize) -> Vec<serde_json::Value> {
    (1..=count)
        .map(|i| book(&format!("Book {i:02}"), "Ann Author", "3rd Grade", "500L"))
        .collect()
}

fn grades(list: &[Grade]) -> FilterState {
    FilterState {
        grades: Some(list.iter().copied().collect::<BTreeSet<_>>()),
        ..Default::default()
    }
}

type Frames = Arc<Mutex<Vec<PageSnapshot>>>;

fn catalog(source: FakeSource) -> (Catalog<FakeSource>, Frames) {
    let frames: Frames = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&frames);
    let catalog = Catalog::with_source(source, &Options::default(), move |view: &PageView<'_>| {
        sink.lock().unwrap().push(view.to_snapshot());
    });
    (catalog, frames)
}

fn titles(page: &PageSnapshot) -> Vec<String> {
    page.items.iter().map(|i| i.title.clone()).collect()
}

#[tokio::test]
async fn unfiltered_load_issues_one_query() {
    let source = FakeSource::default().books(None, numbered_books(3));
    let (catalog, frames) = catalog(source);

    let outcome = catalog.load(FilterState::default()).await.unwrap();
    assert_eq!(
        outcome,
        LoadOutcome::Applied {
            generation: 1,
            total_items: 3
        }
    );

    let seen = catalog.source().seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].grade_level, None);
    assert_eq!(seen[0].query_string(), "limit=500");
    assert_eq!(frames.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn grade_fan_out_merges_shared_titles() {
    let source = FakeSource::default()
        .books(
            Some(Grade::Third),
            vec![book("Wonder", "R. J. Palacio", "3rd Grade", "790L")],
        )
        .books(
            Some(Grade::Fourth),
            vec![book("Wonder", "R. J. Palacio", "4th Grade", "790L")],
        );
    let (catalog, _frames) = catalog(source);

    catalog
        .load(grades(&[Grade::Fourth, Grade::Third]))
        .await
        .unwrap();

    let seen: Vec<_> = catalog
        .source()
        .seen()
        .into_iter()
        .map(|q| q.grade_level)
        .collect();
    assert_eq!(seen, vec![Some(Grade::Third), Some(Grade::Fourth)]);

    let page = catalog.snapshot();
    assert_eq!(page.total_items, 1);
    assert_eq!(page.items[0].grade_levels, vec!["3rd Grade", "4th Grade"]);
}

#[tokio::test]
async fn filters_reach_every_query() {
    let source = FakeSource::default();
    let (catalog, _frames) = catalog(source);
    let filters = FilterState {
        literature_type: Some(LiteratureType::Nonfiction),
        lexile_min: Some(300),
        ..grades(&[Grade::Kindergarten, Grade::Twelfth])
    };

    catalog.load(filters.clone()).await.unwrap();

    let seen = catalog.source().seen();
    assert_eq!(seen, query::resolve(&filters, Some(500)));
    assert!(seen
        .iter()
        .all(|q| q.literature_type == Some(LiteratureType::Nonfiction) && q.lexile_min == Some(300)));
    assert_eq!(catalog.filters(), filters);
}

#[tokio::test]
async fn unsuccessful_envelope_contributes_nothing() {
    let source = FakeSource::default()
        .books(
            Some(Grade::Third),
            vec![book("Holes", "Louis Sachar", "3rd Grade", "660L")],
        )
        .respond(
            Some(Grade::Fourth),
            200,
            r#"{"success":false,"error":"database unavailable"}"#.to_string(),
        );
    let (catalog, _frames) = catalog(source);

    catalog
        .load(grades(&[Grade::Third, Grade::Fourth]))
        .await
        .unwrap();

    assert_eq!(titles(&catalog.snapshot()), vec!["Holes"]);
}

#[tokio::test]
async fn mistyped_record_is_skipped_not_fatal() {
    let body = json!({
        "success": true,
        "data": [
            { "title": 42, "author": "Nobody" },
            book("Holes", "Louis Sachar", "5th Grade", "660L"),
        ],
    });
    let source = FakeSource::default().respond(None, 200, body.to_string());
    let (catalog, frames) = catalog(source);

    let outcome = catalog.load(FilterState::default()).await.unwrap();
    assert_eq!(
        outcome,
        LoadOutcome::Applied {
            generation: 1,
            total_items: 1
        }
    );
    assert_eq!(titles(&catalog.snapshot()), vec!["Holes"]);
    assert_eq!(frames.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn failed_request_keeps_previous_catalog() {
    let source = FakeSource::default()
        .books(None, numbered_books(2))
        .respond(Some(Grade::Fifth), 500, "Internal Server Error".to_string());
    let (catalog, frames) = catalog(source);

    catalog.load(FilterState::default()).await.unwrap();
    let err = catalog.load(grades(&[Grade::Fifth])).await.unwrap_err();

    assert!(matches!(err, CatalogError::Http { status: 500 }));
    assert!(err.is_network());
    let page = catalog.snapshot();
    assert_eq!(page.total_items, 2);
    assert_eq!(catalog.filters(), FilterState::default());
    assert_eq!(frames.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn garbage_body_is_a_network_error() {
    let source = FakeSource::default().respond(None, 200, "<html>oops</html>".to_string());
    let (catalog, frames) = catalog(source);

    let err = catalog.load(FilterState::default()).await.unwrap_err();
    assert!(matches!(err, CatalogError::Decode { .. }));
    assert!(err.is_network());
    assert!(frames.lock().unwrap().is_empty());
}

#[tokio::test]
async fn fan_out_results_keep_issue_order() {
    let gate = Arc::new(Notify::new());
    let mut source = FakeSource::default()
        .books(
            Some(Grade::Third),
            vec![book("Zebra Days", "Kim Lee", "3rd Grade", "400L")],
        )
        .books(
            Some(Grade::Fourth),
            vec![book("Apple Orchard", "Sam Ortiz", "4th Grade", "500L")],
        );
    source.waits.insert(Some(Grade::Third), Arc::clone(&gate));
    source.signals.insert(Some(Grade::Fourth), gate);

    let queries = query::resolve(&grades(&[Grade::Third, Grade::Fourth]), None);
    let records = fetcher::fetch_all(&source, &queries, None).await.unwrap();

    let got: Vec<_> = records.iter().filter_map(|r| r.title.clone()).collect();
    assert_eq!(got, vec!["Zebra Days", "Apple Orchard"]);
}

#[tokio::test]
async fn newer_load_wins_over_slow_older_one() {
    let gate = Arc::new(Notify::new());
    let mut source = FakeSource::default()
        .books(
            Some(Grade::Third),
            vec![book("Old Answer", "A Writer", "3rd Grade", "300L")],
        )
        .books(
            Some(Grade::Fourth),
            vec![book("New Answer", "B Writer", "4th Grade", "300L")],
        );
    source.waits.insert(Some(Grade::Third), Arc::clone(&gate));
    source.signals.insert(Some(Grade::Fourth), gate);
    let (catalog, frames) = catalog(source);

    let (older, newer) = tokio::join!(
        catalog.load(grades(&[Grade::Third])),
        catalog.load(grades(&[Grade::Fourth])),
    );

    assert_eq!(older.unwrap(), LoadOutcome::Stale { generation: 1 });
    assert_eq!(
        newer.unwrap(),
        LoadOutcome::Applied {
            generation: 2,
            total_items: 1
        }
    );
    assert_eq!(titles(&catalog.snapshot()), vec!["New Answer"]);
    assert_eq!(catalog.filters(), grades(&[Grade::Fourth]));

    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(titles(&frames[0]), vec!["New Answer"]);
}

#[tokio::test]
async fn pages_cover_the_catalog_exactly_once() {
    let source = FakeSource::default().books(None, numbered_books(45));
    let (catalog, frames) = catalog(source);
    catalog.load(FilterState::default()).await.unwrap();

    assert!(catalog.go_to_page(2));
    assert!(catalog.go_to_page(3));

    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 3);
    let sizes: Vec<_> = frames.iter().map(|f| f.items.len()).collect();
    assert_eq!(sizes, vec![20, 20, 5]);
    assert_eq!((frames[2].first_index, frames[2].last_index), (41, 45));
    assert!(frames.iter().all(|f| f.total_pages == 3 && f.total_items == 45));

    let seen: Vec<_> = frames.iter().flat_map(titles).collect();
    let expected: Vec<_> = (1..=45).map(|i| format!("Book {i:02}")).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn out_of_range_page_changes_nothing() {
    let source = FakeSource::default().books(None, numbered_books(45));
    let (catalog, frames) = catalog(source);
    catalog.load(FilterState::default()).await.unwrap();
    assert!(catalog.go_to_page(2));

    assert!(!catalog.go_to_page(0));
    assert!(!catalog.go_to_page(4));

    assert_eq!(catalog.snapshot().current_page, 2);
    assert_eq!(frames.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn sort_change_resets_to_first_page() {
    let source = FakeSource::default().books(None, numbered_books(45));
    let (catalog, frames) = catalog(source);
    catalog.load(FilterState::default()).await.unwrap();
    assert!(catalog.go_to_page(3));

    catalog.set_sort(SortKey::new(SortField::Title, SortOrder::Desc));

    assert_eq!(catalog.sort().to_string(), "title-desc");
    let page = catalog.snapshot();
    assert_eq!(page.current_page, 1);
    assert_eq!(page.items[0].title, "Book 45");
    assert_eq!(frames.lock().unwrap().len(), 3);

    catalog.set_sort(SortKey::default());
    assert_eq!(catalog.snapshot().items[0].title, "Book 01");
}

#[tokio::test]
async fn reload_resets_to_first_page() {
    let source = FakeSource::default().books(None, numbered_books(45));
    let (catalog, _frames) = catalog(source);
    catalog.load(FilterState::default()).await.unwrap();
    assert!(catalog.go_to_page(3));

    catalog.clear().await.unwrap();
    assert_eq!(catalog.snapshot().current_page, 1);
    assert_eq!(catalog.generation(), 2);
}

#[tokio::test]
async fn sort_chosen_before_load_applies_to_it() {
    let source = FakeSource::default().books(
        None,
        vec![
            book("Low", "A A", "3rd Grade", "BR"),
            book("High", "B B", "3rd Grade", "1010L"),
            book("Mid", "C C", "3rd Grade", "600L"),
        ],
    );
    let (catalog, frames) = catalog(source);

    catalog.set_sort(SortKey::new(SortField::Lexile, SortOrder::Desc));
    {
        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_empty());
        assert_eq!(frames[0].total_pages, 0);
    }

    catalog.load(FilterState::default()).await.unwrap();
    assert_eq!(titles(&catalog.snapshot()), vec!["High", "Mid", "Low"]);
}

#[tokio::test]
async fn empty_result_renders_no_results() {
    let source = FakeSource::default();
    let (catalog, frames) = catalog(source);
    catalog.load(grades(&[Grade::Ninth])).await.unwrap();

    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].is_empty());
    let text = output::render_text(&frames[0]);
    assert!(text.contains(output::NO_RESULTS_MESSAGE));
    assert!(text.contains("Grades    : 9"));
}

#[tokio::test]
async fn rendered_page_reports_range() {
    colored::control::set_override(false);
    let source = FakeSource::default().books(None, numbered_books(45));
    let (catalog, _frames) = catalog(source);
    catalog.load(FilterState::default()).await.unwrap();
    catalog.go_to_page(3);

    let text = output::render_text(&catalog.snapshot());
    assert!(text.contains("Showing 41-45 of 45 books"));
    assert!(text.contains("1 2 [3]"));
    assert!(text.contains("Page 3 of 3"));

    let json: serde_json::Value =
        serde_json::from_slice(&output::render_json(&catalog.snapshot())).unwrap();
    assert_eq!(json["page"], 3);
    assert_eq!(json["total_items"], 45);
    assert_eq!(json["items"].as_array().unwrap().len(), 5);
}
