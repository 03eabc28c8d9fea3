use chrono::{NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use feedcal_core::{Rule, SourceEvent, SyncHorizon};
use feedcal_providers::{
    CalendarStore, InMemoryStore, ProviderError, RemoteEvent, StaticSource,
};
use feedcal_sync::{CalendarStatus, SyncEngine, SyncError};

const NY: Tz = chrono_tz::America::New_York;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, d).unwrap()
}

fn horizon() -> SyncHorizon {
    SyncHorizon::new(day(1), 14, NY)
}

fn groove_slayers() -> SourceEvent {
    SourceEvent::new("1", "Groove Slayers", day(1), "5:00 AM", "9:00 PM")
        .with_location("Lake Sumter Landing")
        .with_category("Entertainment")
        .with_tags(["Classic Rock"])
}

fn remote_on(remote_id: &str, external_id: &str, d: u32) -> RemoteEvent {
    let start = NY.with_ymd_and_hms(2025, 7, d, 10, 0, 0).unwrap().with_timezone(&Utc);
    RemoteEvent::new(remote_id, external_id, "remote", start, start)
}

fn feed() -> Vec<SourceEvent> {
    vec![
        groove_slayers(),
        SourceEvent::new("2", "Line Dancing", day(2), "7:00 PM", "8:30 PM")
            .with_category("Dance")
            .with_tags(["Ballroom", "Swing Night"]),
        SourceEvent::new("3", "Bingo", day(3), "1:00 PM", "3:00 PM").with_category("Games"),
        SourceEvent::new("4", "Broken", day(3), "25:00 PM", "3:00 PM"),
    ]
}

fn rules() -> Vec<Rule> {
    vec![
        Rule::new("all entertainment").with_category("entertainment"),
        Rule::new("dances").with_tags(["dance", "swing"]),
        Rule::new("everything"),
    ]
}

#[tokio::test]
async fn new_event_is_created_in_catch_all_calendar() {
    let source = StaticSource::new(vec![groove_slayers()]);
    let store = InMemoryStore::new();

    let report = SyncEngine::new(&source, &store)
        .run(&[Rule::new("all entertainment")], &horizon())
        .await
        .unwrap();

    let calendar = report.calendar("all entertainment").unwrap();
    assert_eq!(calendar.created, vec!["1"]);
    assert!(calendar.kept.is_empty());
    assert!(calendar.deleted.is_empty());

    let events = store.events("all entertainment");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].external_id, "1");
    assert_eq!(events[0].title, "Groove Slayers");
    assert_eq!(
        events[0].start,
        NY.with_ymd_and_hms(2025, 7, 1, 5, 0, 0).unwrap().with_timezone(&Utc)
    );
}

#[tokio::test]
async fn existing_event_is_kept() {
    let source = StaticSource::new(vec![groove_slayers()]);
    let store = InMemoryStore::new();
    let cal = store.add_calendar("all entertainment", NY);
    store.insert_event(&cal.id, remote_on("r1", "1", 1)).unwrap();

    let report = SyncEngine::new(&source, &store)
        .run(&[Rule::new("all entertainment")], &horizon())
        .await
        .unwrap();

    let calendar = report.calendar("all entertainment").unwrap();
    assert!(calendar.created.is_empty());
    assert_eq!(calendar.kept, vec!["1"]);
    assert!(calendar.deleted.is_empty());
    assert_eq!(store.calls().mutations(), 0);
}

#[tokio::test]
async fn undesired_event_in_window_is_deleted() {
    let source = StaticSource::new(vec![groove_slayers()]);
    let store = InMemoryStore::new();
    let cal = store.add_calendar("all entertainment", NY);
    store.insert_event(&cal.id, remote_on("r1", "1", 1)).unwrap();
    store.insert_event(&cal.id, remote_on("r99", "99", 4)).unwrap();

    let report = SyncEngine::new(&source, &store)
        .run(&[Rule::new("all entertainment")], &horizon())
        .await
        .unwrap();

    let calendar = report.calendar("all entertainment").unwrap();
    assert_eq!(calendar.deleted, vec!["99"]);
    let remaining: Vec<_> = store
        .events("all entertainment")
        .into_iter()
        .map(|e| e.external_id)
        .collect();
    assert_eq!(remaining, vec!["1"]);
}

#[tokio::test]
async fn second_run_is_a_noop() {
    let source = StaticSource::new(feed());
    let store = InMemoryStore::new();
    let engine = SyncEngine::new(&source, &store);

    let first = engine.run(&rules(), &horizon()).await.unwrap();
    assert!(first.is_success());
    assert_eq!(first.total_created(), 5);
    assert_eq!(first.unresolved.len(), 1);

    let mutations = store.calls().mutations();
    let second = engine.run(&rules(), &horizon()).await.unwrap();

    assert_eq!(second.total_created(), 0);
    assert_eq!(second.total_deleted(), 0);
    assert_eq!(store.calls().mutations(), mutations);
}

#[tokio::test]
async fn events_land_in_matching_calendars_once() {
    let mut events = feed();
    // the feed repeats an event; it must not be created twice
    events.push(groove_slayers());
    let source = StaticSource::new(events);
    let store = InMemoryStore::new();

    SyncEngine::new(&source, &store).run(&rules(), &horizon()).await.unwrap();

    let ids = |name: &str| -> Vec<String> {
        store.events(name).into_iter().map(|e| e.external_id).collect()
    };
    assert_eq!(store.calendar_names(), vec!["all entertainment", "dances", "everything"]);
    assert_eq!(ids("all entertainment"), vec!["1"]);
    assert_eq!(ids("dances"), vec!["2"]);
    assert_eq!(ids("everything"), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn events_outside_the_window_are_untouched() {
    let source = StaticSource::new(vec![
        groove_slayers(),
        SourceEvent::new("50", "Far Future", NaiveDate::from_ymd_opt(2025, 8, 10).unwrap(), "1:00 PM", "2:00 PM"),
    ]);
    let store = InMemoryStore::new();
    let cal = store.add_calendar("everything", NY);
    let past = Utc.with_ymd_and_hms(2025, 6, 20, 12, 0, 0).unwrap();
    let later = Utc.with_ymd_and_hms(2025, 7, 20, 12, 0, 0).unwrap();
    store
        .insert_event(&cal.id, RemoteEvent::new("old", "40", "past", past, past))
        .unwrap();
    store
        .insert_event(&cal.id, RemoteEvent::new("late", "41", "later", later, later))
        .unwrap();

    let report = SyncEngine::new(&source, &store)
        .run(&[Rule::new("everything")], &horizon())
        .await
        .unwrap();

    let calendar = report.calendar("everything").unwrap();
    assert_eq!(calendar.created, vec!["1"]);
    assert_eq!(calendar.skipped, vec!["50"]);
    assert!(calendar.deleted.is_empty());

    let ids: Vec<_> = store
        .events("everything")
        .into_iter()
        .map(|e| e.external_id)
        .collect();
    assert_eq!(ids, vec!["40", "41", "1"]);
}

#[tokio::test]
async fn calendar_without_matches_is_emptied() {
    let source = StaticSource::new(vec![groove_slayers()]);
    let store = InMemoryStore::new();
    let cal = store.add_calendar("dances", NY);
    store.insert_event(&cal.id, remote_on("r5", "5", 2)).unwrap();

    let report = SyncEngine::new(&source, &store)
        .run(&[Rule::new("dances").with_tags(["swing"])], &horizon())
        .await
        .unwrap();

    assert_eq!(report.calendar("dances").unwrap().deleted, vec!["5"]);
    assert!(store.events("dances").is_empty());
}

#[tokio::test]
async fn failed_mutations_do_not_stop_the_run() {
    let source = StaticSource::new(feed());
    let store = InMemoryStore::new();
    let cal = store.add_calendar("everything", NY);
    store.insert_event(&cal.id, remote_on("r7", "7", 5)).unwrap();
    store.fail_create_for("2");
    store.fail_delete_for("7");

    let report = SyncEngine::new(&source, &store)
        .run(&rules(), &horizon())
        .await
        .unwrap();

    let everything = report.calendar("everything").unwrap();
    assert_eq!(everything.created, vec!["1", "3"]);
    assert!(everything.deleted.is_empty());
    assert_eq!(everything.status(), CalendarStatus::Partial { failed: 2 });

    let dances = report.calendar("dances").unwrap();
    assert_eq!(dances.status(), CalendarStatus::Partial { failed: 1 });
    assert_eq!(report.failed_mutations(), 3);
    assert!(report.is_success());
}

#[tokio::test]
async fn quota_exceeded_on_create_does_not_stop_the_run() {
    let source = StaticSource::new(feed());
    let store = InMemoryStore::new();
    store.fail_create_with(
        "2",
        ProviderError::from_status(
            403,
            "create event",
            r#"{"error":{"errors":[{"domain":"usageLimits","reason":"rateLimitExceeded"}],"code":403}}"#,
        ),
    );

    let report = SyncEngine::new(&source, &store)
        .run(&rules(), &horizon())
        .await
        .unwrap();

    assert!(report.aborted.is_none());
    assert_eq!(report.calendars.len(), 3);
    assert_eq!(report.calendar("all entertainment").unwrap().created, vec!["1"]);
    assert_eq!(
        report.calendar("dances").unwrap().status(),
        CalendarStatus::Partial { failed: 1 }
    );
    let everything = report.calendar("everything").unwrap();
    assert_eq!(everything.created, vec!["1", "3"]);
    assert_eq!(everything.status(), CalendarStatus::Partial { failed: 1 });
    assert_eq!(report.failed_mutations(), 2);
    assert!(report.is_success());
}

#[tokio::test]
async fn failed_listing_marks_only_that_calendar() {
    let source = StaticSource::new(feed());
    let store = InMemoryStore::new();
    store.add_calendar("dances", NY);
    store.fail_list_for("dances");

    let report = SyncEngine::new(&source, &store)
        .run(&rules(), &horizon())
        .await
        .unwrap();

    assert!(matches!(
        report.calendar("dances").unwrap().status(),
        CalendarStatus::Failed { .. }
    ));
    assert_eq!(report.calendar("everything").unwrap().created.len(), 3);
    assert_eq!(report.failed_calendars(), 1);
    assert!(!report.is_success());
    assert!(store.events("dances").is_empty());
}

#[tokio::test]
async fn auth_failure_stops_remaining_calendars() {
    let source = StaticSource::new(feed());
    let store = InMemoryStore::new();
    store.fail_auth();

    let report = SyncEngine::new(&source, &store)
        .run(&rules(), &horizon())
        .await
        .unwrap();

    assert!(matches!(report.aborted, Some(SyncError::Authentication(_))));
    assert_eq!(report.calendars.len(), 1);
    assert_eq!(store.calls().find_calendar, 1);
    assert_eq!(store.calls().list_events, 0);
}

#[tokio::test]
async fn fetch_failure_aborts_the_run() {
    let source = StaticSource::new(Vec::new());
    let store = InMemoryStore::new();
    let err = SyncEngine::new(&source, &store)
        .run(&rules(), &horizon())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::EmptyFeed));
}

#[tokio::test]
async fn dry_run_makes_no_changes() {
    let source = StaticSource::new(feed());
    let store = InMemoryStore::new();
    let cal = store.add_calendar("everything", NY);
    store.insert_event(&cal.id, remote_on("r1", "1", 1)).unwrap();
    store.insert_event(&cal.id, remote_on("r9", "9", 6)).unwrap();

    let report = SyncEngine::new(&source, &store)
        .with_dry_run(true)
        .run(&rules(), &horizon())
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(store.calls().mutations(), 0);
    assert_eq!(store.calendar_names(), vec!["everything"]);

    let everything = report.calendar("everything").unwrap();
    assert_eq!(everything.created, vec!["2", "3"]);
    assert_eq!(everything.kept, vec!["1"]);
    assert_eq!(everything.deleted, vec!["9"]);
    assert!(everything.outcomes.is_empty());

    // calendars that do not exist yet are planned as empty
    assert_eq!(report.calendar("dances").unwrap().created, vec!["2"]);
}

#[tokio::test]
async fn duplicates_already_in_the_store_are_removed() {
    let source = StaticSource::new(vec![groove_slayers()]);
    let store = InMemoryStore::new();
    let cal = store.add_calendar("music", NY);
    store.insert_event(&cal.id, remote_on("a", "1", 1)).unwrap();
    store.insert_event(&cal.id, remote_on("b", "1", 1)).unwrap();

    SyncEngine::new(&source, &store)
        .run(&[Rule::new("music")], &horizon())
        .await
        .unwrap();

    let remaining: Vec<_> = store.events("music").into_iter().map(|e| e.remote_id).collect();
    assert_eq!(remaining, vec!["a"]);

    let listed = store.list_events(&cal.id, &horizon()).await.unwrap();
    assert_eq!(listed.len(), 1);
}
