/*!
 * Batch runs against an on-disk vocabulary database
 */

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use vocabclip::app_controller::{BatchTermination, Controller};
use vocabclip::database::{Repository, SENTINEL_TEXT};
use vocabclip::providers::mock::{success, ScriptedProvider};
use vocabclip::providers::FetchOutcome;
use vocabclip::proxy::ProxyRotator;
use vocabclip::sentence_window::WindowResult;

use crate::common;

/// Work done in one run survives a reopen; only unfinished rows come back
#[tokio::test]
async fn test_runBatch_acrossRuns_shouldResumeUnfinishedRows() {
    common::init_logging();
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("data").join("vocab.db");
    let db_path = db_path.to_str().unwrap();

    let ids = {
        let repo = Repository::open(db_path).unwrap();
        let mut ids = Vec::new();
        for (word, video) in [("apple", "v1"), ("river", "v2"), ("red", "v3")] {
            ids.push(repo.insert_word(word, Some(video)).await.unwrap());
        }

        let provider = ScriptedProvider::new(vec![
            FetchOutcome::NoCaptions,
            success(common::sample_chunks()),
            FetchOutcome::Fatal("connection reset".to_string()),
        ]);
        let mut controller = Controller::new(common::quiet_config(), provider, repo, ProxyRotator::direct());
        let report = controller.run_batch().await.unwrap();
        assert_eq!(report.termination, BatchTermination::Completed);
        assert_eq!((report.succeeded, report.sentinels, report.gave_up), (1, 1, 1));
        ids
    };

    let repo = Repository::open(db_path).unwrap();
    let pending: Vec<i64> = repo.select_pending(100, None).await.unwrap().into_iter().map(|p| p.id).collect();
    // placeholder row and the failed row, not the finished one
    assert_eq!(pending, vec![ids[0], ids[2]]);
    assert!(repo.get_window(ids[0]).await.unwrap().unwrap().is_sentinel());

    let provider = ScriptedProvider::always(common::sample_chunks());
    let mut controller = Controller::new(common::quiet_config(), provider.clone(), repo.clone(), ProxyRotator::direct());
    let report = controller.run_batch().await.unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(provider.calls().iter().map(|c| c.video_id.as_str()).collect::<Vec<_>>(), vec!["v1", "v3"]);
    assert!(repo.select_pending(100, None).await.unwrap().is_empty());

    let stats = repo.connection().stats().unwrap();
    assert_eq!(stats.total_words, 3);
    assert_eq!(stats.with_window, 3);
    assert_eq!(stats.to_string(), "Words: 3, with video: 3, with window: 3");
}

#[tokio::test]
async fn test_writeResult_shouldStoreWindowAndUtcTimestamp() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::open(dir.path().join("vocab.db").to_str().unwrap()).unwrap();
    let id = repo.insert_word("lantern", Some("abc")).await.unwrap();
    let window = WindowResult {
        start: 3.5,
        end: 9.25,
        sentence: "hold the lantern up high.".to_string(),
    };
    let at = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();

    repo.write_result(id, &window, "en-GB", at).await.unwrap();

    let stored = repo.get_window(id).await.unwrap().unwrap();
    assert_eq!(stored.start_time, Some(3.5));
    assert_eq!(stored.end_time, Some(9.25));
    assert_eq!(stored.subtitle_text.as_deref(), Some("hold the lantern up high."));
    assert_eq!(stored.subtitle_lang.as_deref(), Some("en-GB"));
    let stamp = stored.subtitle_updated_at.clone().unwrap();
    assert_eq!(stamp, "2026-03-14T15:09:26+00:00");
    assert_eq!(DateTime::parse_from_rfc3339(&stamp).unwrap(), at);
    assert!(!stored.is_sentinel());
}

#[tokio::test]
async fn test_writes_withUnknownRow_shouldFail() {
    let (repo, _) = common::seeded_repo(&[("apple", "v1")]).await;
    let window = WindowResult {
        start: 1.0,
        end: 2.0,
        sentence: "apple".to_string(),
    };

    assert!(repo.write_result(999, &window, "en", Utc::now()).await.is_err());
    assert!(repo.write_sentinel(999, SENTINEL_TEXT).await.is_err());
}

#[tokio::test]
async fn test_selectPending_shouldIgnoreRowsThatCannotBeProcessed() {
    let (repo, ids) = common::seeded_repo(&[("a", "v1"), ("apple", ""), ("pear", "v3"), ("plum", "v4")]).await;
    repo.insert_word("orphan", None).await.unwrap();
    repo.write_sentinel(ids[3], "   ").await.unwrap();

    let pending = repo.select_pending(100, None).await.unwrap();

    // single-letter word and rows without video are never selected, blank text still counts as pending
    let selected: Vec<&str> = pending.iter().map(|p| p.word.as_str()).collect();
    assert_eq!(selected, vec!["pear", "plum"]);
}

#[tokio::test]
async fn test_selectPending_shouldHonorLimitInRowOrder() {
    let (repo, ids) = common::seeded_repo(&[("one", "v1"), ("two", "v2"), ("three", "v3")]).await;

    let pending = repo.select_pending(2, None).await.unwrap();

    assert_eq!(pending.iter().map(|p| p.id).collect::<Vec<_>>(), vec![ids[0], ids[1]]);
    assert_eq!(pending[0].video_id, "v1");
}

#[tokio::test]
async fn test_selectPending_withThreshold_shouldOnlyReturnLongWindows() {
    let (repo, ids) = common::seeded_repo(&[("long", "v1"), ("short", "v2"), ("todo", "v3"), ("none", "v4")]).await;
    let long = WindowResult {
        start: 10.0,
        end: 31.0,
        sentence: "long".to_string(),
    };
    let short = WindowResult {
        start: 10.0,
        end: 14.0,
        sentence: "short".to_string(),
    };
    repo.write_result(ids[0], &long, "en", Utc::now()).await.unwrap();
    repo.write_result(ids[1], &short, "en", Utc::now()).await.unwrap();
    repo.write_sentinel(ids[3], SENTINEL_TEXT).await.unwrap();

    let pending = repo.select_pending(100, Some(20.0)).await.unwrap();

    assert_eq!(pending.iter().map(|p| p.id).collect::<Vec<_>>(), vec![ids[0]]);
}

/// A database created by an older release without the caption columns is refused
#[test]
fn test_open_withLegacyTable_shouldReportMissingColumns() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("legacy.db");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE words (original TEXT, videoId TEXT, startTime REAL, endTime REAL, subtitleText TEXT);
             INSERT INTO words (original, videoId) VALUES ('apple', 'v1');",
        )
        .unwrap();
    }

    let error = match Repository::open(path.to_str().unwrap()) {
        Ok(_) => panic!("legacy table should be rejected"),
        Err(e) => e.to_string(),
    };

    assert!(error.contains("subtitleLang"), "{}", error);
    assert!(error.contains("subtitleUpdatedAt"), "{}", error);

    // the rows are left alone
    let conn = rusqlite::Connection::open(&path).unwrap();
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM words", [], |row| row.get(0)).unwrap();
    assert_eq!(count, 1);
}
