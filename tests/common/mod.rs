/*!
 * Common test utilities for the vocabclip test suite
 */

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use vocabclip::app_config::Config;
use vocabclip::caption_parser::Chunk;
use vocabclip::database::Repository;

/// Route logs through the test harness; safe to call from every test
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Default configuration without pauses between items
pub fn quiet_config() -> Config {
    let mut config = Config::default();
    config.batch.sleep_min_secs = 0.0;
    config.batch.sleep_max_secs = 0.0;
    config
}

/// Short transcript where "apple" and "river" are spoken
pub fn sample_chunks() -> Vec<Chunk> {
    vec![
        Chunk::new("Good morning everyone.", 0.0, 2.0),
        Chunk::new("I saw an apple today.", 10.0, 12.0),
        Chunk::new("It was red.", 12.0, 14.0),
        Chunk::new("We walked down", 14.0, 16.0),
        Chunk::new("to the river bank.", 16.0, 18.5),
    ]
}

/// In-memory repository seeded with `(word, video)` rows, returning the row ids
pub async fn seeded_repo(rows: &[(&str, &str)]) -> (Repository, Vec<i64>) {
    let repo = Repository::new_in_memory().expect("in-memory repository");
    let mut ids = Vec::new();
    for (word, video) in rows {
        ids.push(repo.insert_word(word, Some(video)).await.expect("insert word"));
    }
    (repo, ids)
}

/// A response from the local HTTP server
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self { status: 200, body: body.into() }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }
}

/// Minimal HTTP/1.1 server answering each request through `route`.
///
/// Returns the bound address and the raw request heads received so far.
pub async fn spawn_http_server<F>(route: F) -> (SocketAddr, Arc<Mutex<Vec<String>>>)
where
    F: Fn(&str) -> HttpResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind http server");
    let addr = listener.local_addr().expect("local addr");
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();
    let route = Arc::new(route);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let route = route.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&head).to_string();
                let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                seen.lock().unwrap().push(head);

                let response = route(&path);
                let reply = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.status,
                    response.body.len(),
                    response.body
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, requests)
}

/// Watch page embedding a player response with the given caption tracks JSON
pub fn watch_page(caption_tracks_json: &str) -> String {
    format!(
        r#"<html><script>var ytInitialPlayerResponse = {{"playabilityStatus":{{"status":"OK"}},"captions":{{"playerCaptionsTracklistRenderer":{{"captionTracks":{}}}}}}};var meta = {{}};</script></html>"#,
        caption_tracks_json
    )
}

/// json3 payload for `(text, start_ms, duration_ms)` events
pub fn json3_payload(events: &[(&str, u64, u64)]) -> String {
    let events: Vec<serde_json::Value> = events
        .iter()
        .map(|(text, start, duration)| {
            serde_json::json!({
                "tStartMs": start,
                "dDurationMs": duration,
                "segs": [{ "utf8": text }]
            })
        })
        .collect();
    serde_json::json!({ "events": events }).to_string()
}
