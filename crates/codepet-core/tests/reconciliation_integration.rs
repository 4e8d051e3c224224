//! Integration tests for the reconciliation flow.
//!
//! Runs the orchestrator against the real HTTP sources (served by mockito)
//! and a SQLite store on disk.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use codepet_core::{
    CoreError, DayKey, GitHubSource, LeetCodeSource, ProfileStore, ReconciliationOrchestrator,
    SourceSelector, SqliteProfileStore, Stage,
};
use mockito::Matcher;

fn may(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
}

fn engine(server: &mockito::ServerGuard, store: Arc<SqliteProfileStore>) -> ReconciliationOrchestrator {
    let github = GitHubSource::new(&server.url(), None, "codepet-test", Duration::from_secs(5)).unwrap();
    let leetcode = LeetCodeSource::new(
        &format!("{}/graphql", server.url()),
        "codepet-test",
        Duration::from_secs(5),
    )
    .unwrap();
    ReconciliationOrchestrator::new(Arc::new(github), Arc::new(leetcode), store)
}

async fn mock_user(server: &mut mockito::ServerGuard, login: &str) -> mockito::Mock {
    server
        .mock("GET", format!("/users/{login}").as_str())
        .with_status(200)
        .with_body(format!(r#"{{"login":"{login}"}}"#))
        .create_async()
        .await
}

#[tokio::test]
async fn test_primary_streak_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("codepet.db");
    let mut server = mockito::Server::new_async().await;

    let _user = mock_user(&mut server, "octocat").await;
    let _search = server
        .mock("GET", "/search/commits")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{"items":[
                {"commit":{"author":{"date":"2024-05-08T09:00:00Z"}}},
                {"commit":{"author":{"date":"2024-05-09T21:15:00Z"}}},
                {"commit":{"author":{"date":"2024-05-10T06:30:00Z"}}}
            ]}"#,
        )
        .create_async()
        .await;

    {
        let store = Arc::new(SqliteProfileStore::open(&db_path).unwrap());
        let engine = engine(&server, store);
        for day in 8..=10 {
            let res = engine
                .reconcile("octocat", SourceSelector::Primary, may(day, 22))
                .await
                .unwrap();
            assert_eq!(res.current_streak, day - 7);
        }
    }

    let store = SqliteProfileStore::open(&db_path).unwrap();
    let rec = store.get("octocat").await.unwrap().unwrap();
    assert_eq!(rec.current_streak, 3);
    assert_eq!(rec.longest_streak, 3);
    assert_eq!(rec.total_activity_count, 3);
    assert_eq!(rec.last_active_day, DayKey::from_ymd(2024, 5, 10));
    assert_eq!(rec.stage, Stage::Egg);
}

#[tokio::test]
async fn test_rate_limited_search_and_fallback_do_not_touch_the_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteProfileStore::open(dir.path().join("codepet.db")).unwrap());
    let mut server = mockito::Server::new_async().await;

    let _user = mock_user(&mut server, "octocat").await;
    let search = server
        .mock("GET", "/search/commits")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"items":[{"commit":{"author":{"date":"2024-05-01T09:00:00Z"}}}]}"#)
        .create_async()
        .await;

    let engine = engine(&server, Arc::clone(&store));
    engine
        .reconcile("octocat", SourceSelector::Primary, may(1, 12))
        .await
        .unwrap();
    let before = store.get("octocat").await.unwrap().unwrap();
    search.remove_async().await;

    let _limited = server
        .mock("GET", "/search/commits")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_header("x-ratelimit-remaining", "0")
        .with_body(r#"{"message":"API rate limit exceeded for 127.0.0.1."}"#)
        .create_async()
        .await;
    let _repos = server
        .mock("GET", "/users/octocat/repos")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_header("x-ratelimit-remaining", "0")
        .with_body(r#"{"message":"API rate limit exceeded for 127.0.0.1."}"#)
        .create_async()
        .await;

    let err = engine
        .reconcile("octocat", SourceSelector::Primary, may(5, 12))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::RateLimited { .. }));
    assert_eq!(err.kind().status_code(), 429);
    assert_eq!(store.get("octocat").await.unwrap().unwrap(), before);
}

#[tokio::test]
async fn test_secondary_stats_through_graphql() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteProfileStore::open(dir.path().join("codepet.db")).unwrap());
    let mut server = mockito::Server::new_async().await;

    // 2024-05-09 and 2024-05-10 at UTC midnight
    let _graphql = server
        .mock("POST", "/graphql")
        .match_body(Matcher::PartialJsonString(
            r#"{"variables":{"username":"octo_lc"}}"#.to_string(),
        ))
        .with_status(200)
        .with_body(
            r#"{"data":{"matchedUser":{
                "submitStats":{"acSubmissionNum":[
                    {"difficulty":"All","count":12},
                    {"difficulty":"Easy","count":9},
                    {"difficulty":"Medium","count":3},
                    {"difficulty":"Hard","count":0}
                ]},
                "submissionCalendar":"{\"1715212800\": 2, \"1715299200\": 1}"
            }}}"#,
        )
        .create_async()
        .await;

    let engine = engine(&server, Arc::clone(&store));
    let err = engine.get_secondary_stats_at("octocat", may(10, 20)).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    engine.link_secondary_source("octocat", "octo_lc").await.unwrap();
    engine.get_secondary_stats_at("octocat", may(9, 20)).await.unwrap();
    let stats = engine.get_secondary_stats_at("octocat", may(10, 20)).await.unwrap();

    assert_eq!(stats.username, "octo_lc");
    assert_eq!(stats.total_solved, 12);
    assert_eq!(stats.current_streak, 2);
    assert_eq!(stats.longest_streak, 2);
    assert!(stats.solved_today);
    assert_eq!(stats.message, "You have 1 accepted submission today!");

    let rec = store.get("octocat").await.unwrap().unwrap();
    assert_eq!(rec.linked_secondary_id.as_deref(), Some("octo_lc"));
    assert_eq!(rec.secondary_streak, 2);
}

#[tokio::test]
async fn test_repository_listing_is_cached() {
    let store = Arc::new(SqliteProfileStore::open_memory().unwrap());
    let mut server = mockito::Server::new_async().await;

    let user = server
        .mock("GET", "/users/octocat")
        .with_status(200)
        .with_body(r#"{"login":"octocat"}"#)
        .expect(1)
        .create_async()
        .await;
    let repos = server
        .mock("GET", "/users/octocat/repos")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"[{"id":1,"name":"Spoon-Knife","html_url":"https://github.com/octocat/Spoon-Knife"}]"#)
        .expect(1)
        .create_async()
        .await;

    let engine = engine(&server, store);
    let first = engine.list_recent_items("octocat").await.unwrap();
    let second = engine.list_recent_items("octocat").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.repos[0].name, "Spoon-Knife");

    user.assert_async().await;
    repos.assert_async().await;
}
