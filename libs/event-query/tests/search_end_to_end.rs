//! End-to-end searches through the engine against in-memory stores.

mod test_support;

use linkedevents_query::{
    Advisory, AttributePredicate, Coordinate, Error, EventStatus, FilterExpr, GeoPredicate,
    KeywordId, Language, LocalizedText, Page, PageToken, PredicateKind, QueryConfig, SearchEngine,
    SearchRequest, SerializedEvent, SortField, SortKey, StorageCapabilities, TimePredicate,
};
use std::sync::Arc;
use test_support::{event, fi, helsinki_fixture, keyword, place, ts, CountingStore};

fn engine(store: Arc<CountingStore>) -> SearchEngine {
    SearchEngine::new(store, QueryConfig::default())
}

fn names(events: &[SerializedEvent]) -> Vec<Option<&str>> {
    events.iter().map(|e| e.name.as_deref()).collect()
}

fn ids(events: &[SerializedEvent]) -> Vec<&str> {
    events.iter().map(|e| e.id.as_str()).collect()
}

fn radius_active_at_noon() -> SearchRequest {
    SearchRequest::new()
        .with_geo(GeoPredicate::Radius {
            center: Coordinate::new(60.17, 24.94),
            meters: 5_000.0,
        })
        .with_time(TimePredicate::ActiveAt {
            instant: ts("2024-06-01T12:00:00Z"),
        })
        .with_languages(vec![Language::Fi, Language::En])
}

#[tokio::test]
async fn radius_and_active_at_with_language_fallback() {
    let store = Arc::new(CountingStore::new(helsinki_fixture()));
    let result = engine(store.clone())
        .search(&radius_active_at_noon())
        .await
        .unwrap();

    let events: Vec<SerializedEvent> = result.events.iter().collect();
    assert_eq!(ids(&events), vec!["linkedevents:agg-1", "linkedevents:agg-2"]);
    assert_eq!(names(&events), vec![Some("Kesäkonsertti"), Some("Art exhibition")]);
    assert_eq!(result.total, 2);
    assert!(result.next.is_none());
    assert!(result.previous.is_none());
    assert!(result.advisories.is_empty());

    // Expanded inline from the single bulk lookups.
    assert_eq!(events[0].keywords[0].name.as_deref(), Some("konsertit"));
    assert_eq!(events[0].audience[0].replaced_by, Some(KeywordId::new("yso:p13050")));
    assert_eq!(
        events[1].location.as_ref().and_then(|l| l.name.as_deref()),
        Some("Berghäll")
    );
}

#[tokio::test]
async fn keywords_are_fetched_once_per_page() {
    let mut fixture = helsinki_fixture();
    fixture.keywords.push(keyword("yso:p1", "yksi", "one"));
    for i in 0..30 {
        let mut e = event(&format!("bulk:{i:02}"), fi("Tapahtuma"));
        e.keywords = vec![KeywordId::new("yso:p1"), KeywordId::new("yso:p11185")];
        fixture.events.push(e);
    }

    for page_size in [1, 5, 35] {
        let store = Arc::new(CountingStore::new(fixture.clone()));
        let result = engine(store.clone())
            .search(&SearchRequest::new().with_page_size(page_size))
            .await
            .unwrap();
        assert_eq!(result.events.len(), page_size);
        assert_eq!(CountingStore::calls(&store.keyword_calls), 1, "page size {page_size}");
        assert!(CountingStore::calls(&store.location_calls) <= 1);
    }
}

#[tokio::test]
async fn page_without_keywords_skips_keyword_lookup() {
    let mut fixture = helsinki_fixture();
    fixture.events.retain(|e| e.id.as_str() == "linkedevents:agg-5");
    let store = Arc::new(CountingStore::new(fixture));
    let result = engine(store.clone()).search(&SearchRequest::new()).await.unwrap();
    assert_eq!(result.total, 1);
    assert_eq!(CountingStore::calls(&store.keyword_calls), 0);
    assert_eq!(CountingStore::calls(&store.location_calls), 0);
}

#[tokio::test]
async fn oversized_pages_are_clamped_and_paged_by_token() {
    let mut fixture = helsinki_fixture();
    fixture.events.clear();
    for i in 0..130 {
        fixture.events.push(event(&format!("bulk:{i:03}"), fi("Tapahtuma")));
    }
    let engine = engine(Arc::new(CountingStore::new(fixture)));

    let first = engine
        .search(&SearchRequest::new().with_page_size(500))
        .await
        .unwrap();
    assert_eq!(first.events.len(), 100);
    assert_eq!(first.total, 130);
    assert_eq!(
        first.advisories,
        vec![Advisory::PageSizeClamped {
            requested: 500,
            max: 100
        }]
    );

    let next = first.next.clone().unwrap();
    let second = engine
        .search(&SearchRequest::new().with_page(Page::Token(next)))
        .await
        .unwrap();
    let events: Vec<SerializedEvent> = second.events.iter().collect();
    assert_eq!(events.len(), 30);
    assert_eq!(events[0].id.as_str(), "bulk:100");
    assert!(second.next.is_none());
    assert!(second.previous.is_some());
}

#[tokio::test]
async fn composite_filters_respect_precedence() {
    let store = Arc::new(CountingStore::new(helsinki_fixture()));
    let concerts_or_exhibitions = FilterExpr::atom(AttributePredicate::AnyOfKeywords {
        ids: vec![KeywordId::new("yso:p11185"), KeywordId::new("yso:p5121")],
    });
    let by_city = FilterExpr::atom(AttributePredicate::Publisher {
        id: "ahjo:00001".to_string(),
    });

    let request = SearchRequest::new().with_filter(concerts_or_exhibitions.clone().and(by_city.clone()));
    let result = engine(store.clone()).search(&request).await.unwrap();
    let events: Vec<SerializedEvent> = result.events.iter().collect();
    assert_eq!(ids(&events), vec!["linkedevents:agg-1", "linkedevents:agg-4"]);

    let request = SearchRequest::new().with_filter(concerts_or_exhibitions.and(by_city.negate()));
    let result = engine(store).search(&request).await.unwrap();
    let events: Vec<SerializedEvent> = result.events.iter().collect();
    assert_eq!(ids(&events), vec!["linkedevents:agg-2", "linkedevents:agg-3"]);
}

#[tokio::test]
async fn drafts_are_hidden_unless_requested() {
    let mut fixture = helsinki_fixture();
    let mut draft = event("linkedevents:draft", fi("Luonnos"));
    draft.status = EventStatus::Draft;
    fixture.events.push(draft);
    let engine = engine(Arc::new(CountingStore::new(fixture)));

    let visible = engine.search(&SearchRequest::new()).await.unwrap();
    assert_eq!(visible.total, 5);

    let all = engine
        .search(&SearchRequest::new().include_drafts(true))
        .await
        .unwrap();
    assert_eq!(all.total, 6);
}

#[tokio::test]
async fn polygon_post_filter_counts_exactly_and_windows_after_filtering() {
    let capabilities = StorageCapabilities::all().without_native(PredicateKind::Polygon);
    let store = Arc::new(CountingStore::new(helsinki_fixture()).with_capabilities(capabilities));
    let mut config = QueryConfig::default();
    config.parallel_post_filter_threshold = 1;
    let engine = SearchEngine::new(store.clone(), config);

    // Central Helsinki, excluding Tapiola.
    let central = GeoPredicate::Polygon {
        vertices: vec![
            Coordinate::new(60.15, 24.90),
            Coordinate::new(60.15, 24.98),
            Coordinate::new(60.20, 24.98),
            Coordinate::new(60.20, 24.90),
        ],
    };
    let request = SearchRequest::new().with_geo(central).with_page_size(2);
    let plan = engine.plan(&request).unwrap();
    assert!(plan.needs_post_filter());
    assert!(plan.explain().contains("post-filter:\n  1. [cost"));

    let result = engine.search(&request).await.unwrap();
    let events: Vec<SerializedEvent> = result.events.iter().collect();
    assert_eq!(result.total, 3);
    assert_eq!(
        ids(&events),
        vec!["linkedevents:agg-1", "linkedevents:agg-2"]
    );
    assert!(result.next.is_some());
    // Exact count comes from the filtered candidates, not a storage count.
    assert_eq!(CountingStore::calls(&store.count_calls), 0);
}

#[tokio::test]
async fn invalid_requests_never_touch_storage() {
    let store = Arc::new(CountingStore::new(helsinki_fixture()));
    let engine = engine(store.clone());

    let contradictory = SearchRequest::new()
        .with_time(TimePredicate::StartsAfter {
            instant: ts("2024-06-02T00:00:00Z"),
        })
        .with_filter(FilterExpr::atom(TimePredicate::EndsBefore {
            instant: ts("2024-06-01T00:00:00Z"),
        }));
    let err = engine.search(&contradictory).await.unwrap_err();
    assert!(matches!(err, Error::InvalidPredicate { .. }));
    assert!(err.is_client_error());

    let bad_radius = SearchRequest::new().with_geo(GeoPredicate::Radius {
        center: Coordinate::new(60.17, 24.94),
        meters: 0.0,
    });
    assert!(engine.search(&bad_radius).await.is_err());

    assert_eq!(store.total_calls(), 0);
}

#[tokio::test]
async fn storage_failures_propagate_unchanged() {
    let store = Arc::new(CountingStore::new(helsinki_fixture()).failing());
    let err = engine(store.clone())
        .search(&SearchRequest::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StorageUnavailable(_)));
    assert!(!err.is_client_error());
    assert_eq!(CountingStore::calls(&store.fetch_events_calls), 1);
}

#[tokio::test]
async fn free_text_ignores_case_and_diacritics() {
    let engine = engine(Arc::new(CountingStore::new(helsinki_fixture())));
    let result = engine
        .search(&SearchRequest::new().with_text("KESAKONSERTTI"))
        .await
        .unwrap();
    let events: Vec<SerializedEvent> = result.events.iter().collect();
    assert_eq!(ids(&events), vec!["linkedevents:agg-1"]);
}

#[tokio::test]
async fn identical_requests_give_identical_results() {
    let engine = engine(Arc::new(CountingStore::new(helsinki_fixture())));
    let request = SearchRequest::new()
        .with_languages(vec![Language::En])
        .sort_by(SortKey::asc(SortField::Name));

    let first = serde_json::to_value(engine.search(&request).await.unwrap()).unwrap();
    let second = serde_json::to_value(engine.search(&request).await.unwrap()).unwrap();
    assert_eq!(first, second);

    let names: Vec<&str> = first["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "Art exhibition",
            "Evening concert",
            "Online lecture",
            "Summer concert",
            "Tapiolan kesäpäivä"
        ]
    );
}

#[tokio::test]
async fn unsupported_languages_are_never_served() {
    let store = Arc::new(CountingStore::new(helsinki_fixture()));
    let config = QueryConfig {
        supported_languages: vec![Language::Fi, Language::En],
        ..QueryConfig::default()
    };
    let result = SearchEngine::new(store, config)
        .search(&SearchRequest::new().with_languages(vec![Language::Sv]))
        .await
        .unwrap();
    let events: Vec<SerializedEvent> = result.events.iter().collect();
    assert_eq!(
        names(&events),
        vec![
            Some("Kesäkonsertti"),
            Some("Art exhibition"),
            Some("Tapiolan kesäpäivä"),
            Some("Iltakonsertti"),
            Some("Online lecture")
        ]
    );
    // Berghäll is named only in Swedish.
    assert_eq!(events[1].location.as_ref().and_then(|l| l.name.as_deref()), None);
}

#[tokio::test]
async fn oversized_offsets_are_client_errors() {
    let store = Arc::new(CountingStore::new(helsinki_fixture()));
    let err = engine(store.clone())
        .search(&SearchRequest::new().with_page(Page::Token(PageToken::encode(usize::MAX, 20))))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPredicate { .. }));
    assert_eq!(store.total_calls(), 0);
}

#[tokio::test]
async fn resolved_text_round_trips_for_present_languages() -> anyhow::Result<()> {
    let name = LocalizedText::new()
        .with(Language::Fi, "Sävelten yö")
        .with(Language::Sv, "Tonernas natt")
        .with(Language::En, "Night of Tunes");
    let mut fixture = helsinki_fixture();
    fixture.events = vec![event("linkedevents:rt", name.clone())];
    fixture.locations.push(place("tprek:1", 60.17, 24.94));
    let engine = engine(Arc::new(CountingStore::new(fixture)));

    for (language, stored) in name.iter() {
        let result = engine
            .search(&SearchRequest::new().with_languages(vec![language]))
            .await?;
        let events: Vec<SerializedEvent> = result.events.iter().collect();
        assert_eq!(events[0].name.as_deref(), Some(stored));
    }
    Ok(())
}
