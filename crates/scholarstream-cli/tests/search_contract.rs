use axum::{body::Body, routing::post, Json, Router};
use std::net::SocketAddr;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn ndjson(parts: Vec<&'static str>) -> Body {
    Body::from_stream(futures_util::stream::iter(
        parts
            .into_iter()
            .map(|p| Ok::<_, std::io::Error>(p.as_bytes().to_vec())),
    ))
}

/// One NDJSON chunk, then a connection reset.
fn stream_then_reset(first: &'static str) -> Body {
    let parts: Vec<Result<Vec<u8>, std::io::Error>> = vec![
        Ok(first.as_bytes().to_vec()),
        Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "backend went away",
        )),
    ];
    // Pause before each chunk so the first one reaches the client before the
    // connection is torn down.
    Body::from_stream(futures_util::StreamExt::then(
        futures_util::stream::iter(parts),
        |item| async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            item
        },
    ))
}

async fn run(addr: SocketAddr, args: &[&str]) -> std::process::Output {
    let bin = assert_cmd::cargo::cargo_bin!("scholarstream");
    tokio::process::Command::new(bin)
        .arg("--base-url")
        .arg(format!("http://{addr}"))
        .args(args)
        .env_remove("SCHOLARSTREAM_ENV_FILE")
        .env_remove("SCHOLARSTREAM_YEAR_FILTER")
        .output()
        .await
        .expect("run scholarstream")
}

fn ids(v: &serde_json::Value) -> Vec<String> {
    v["papers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["paper_id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn search_streams_and_sorts() {
    let app = Router::new().route(
        "/stream_search",
        post(|Json(body): Json<serde_json::Value>| async move {
            assert_eq!(body["query"], "protein folding");
            assert_eq!(body["year_filter"], "2018-");
            ndjson(vec![
                "{\"type\":\"refined_query\",\"data\":[\"protein structure prediction\"]}\n",
                "{\"type\":\"papers\",\"data\":[{\"paper_id\":\"p1\",\"title\":\"One\"},",
                "{\"paper_id\":\"p2\",\"title\":\"Two\",\"pdf_url\":\"https://x/2.pdf\"}]}\n",
                "{\"type\":\"relevance\",\"data\":{\"paper_id\":\"p1\",\"relevance\":12}}\n",
                "{\"type\":\"relevance\",\"data\":{\"paper_id\":\"p2\",\"relevance\":88}}\n",
                "{\"type\":\"summary\",\"data\":{\"paper_id\":\"p2\",\"summary\":\"Two, summarized.\"}}\n",
                "{\"type\":\"progress\",\"data\":{\"pct\":100}}\n",
            ])
        }),
    );
    let addr = serve(app).await;

    let out = run(
        addr,
        &["--json", "search", "protein", "folding", "--year-filter", "2018-"],
    )
    .await;
    assert!(
        out.status.success(),
        "search failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse search json");
    assert_eq!(v["ok"].as_bool(), Some(true));
    assert_eq!(v["query"].as_str(), Some("protein folding"));
    assert_eq!(ids(&v), vec!["p2", "p1"]);
    assert_eq!(v["papers"][0]["can_chat"].as_bool(), Some(true));
    assert_eq!(v["papers"][0]["summary"].as_str(), Some("Two, summarized."));
    assert_eq!(v["papers"][1]["summary"].as_str(), Some("Generating summary..."));
    assert_eq!(v["stats"]["ignored"].as_u64(), Some(1));
}

#[tokio::test]
async fn search_transport_error_prints_partial_results() {
    let app = Router::new().route(
        "/stream_search",
        post(|| async {
            stream_then_reset(
                "{\"type\":\"papers\",\"data\":[{\"paper_id\":\"kept\",\"title\":\"Kept\"}]}\n",
            )
        }),
    );
    let addr = serve(app).await;

    let out = run(addr, &["--json", "search", "anything"]).await;
    assert!(!out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse search json");
    assert_eq!(v["ok"].as_bool(), Some(false));
    assert_eq!(v["error"]["code"].as_str(), Some("transport_failed"));
    assert_eq!(ids(&v), vec!["kept"]);
}

#[tokio::test]
async fn search_http_error_is_reported() {
    let app = Router::new().route(
        "/stream_search",
        post(|| async {
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "LLM quota exhausted"})),
            )
        }),
    );
    let addr = serve(app).await;

    let out = run(addr, &["--json", "search", "anything"]).await;
    assert!(!out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse error json");
    assert_eq!(v["error"]["code"].as_str(), Some("backend_error"));
    assert!(v["error"]["message"]
        .as_str()
        .unwrap()
        .contains("LLM quota exhausted"));
}

#[tokio::test]
async fn chat_ready_to_search_runs_the_search() {
    let app = Router::new()
        .route(
            "/chat",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["message"], "I want papers on sparse attention");
                assert_eq!(body["chat_id"], "c-7");
                Json(serde_json::json!({
                    "chat_id": "c-7",
                    "ready_to_search": true,
                    "summary": "sparse attention transformers",
                }))
            }),
        )
        .route(
            "/stream_search",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["query"], "sparse attention transformers");
                ndjson(vec![
                    "{\"type\":\"papers\",\"data\":[{\"paper_id\":\"s1\",\"title\":\"Sparse\"}]}\n",
                ])
            }),
        );
    let addr = serve(app).await;

    let out = run(
        addr,
        &[
            "--json",
            "chat",
            "I want papers on sparse attention",
            "--chat-id",
            "c-7",
        ],
    )
    .await;
    assert!(
        out.status.success(),
        "chat failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse chat json");
    assert_eq!(v["search_query"].as_str(), Some("sparse attention transformers"));
    let texts: Vec<&str> = v["transcript"]["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts.len(), 3);
    assert_eq!(texts[2], "Searched for: \"sparse attention transformers\"");
    assert_eq!(ids(&v["results"]), vec!["s1"]);
}

#[tokio::test]
async fn chat_search_transport_error_prints_partial_results() {
    let app = Router::new()
        .route(
            "/chat",
            post(|| async {
                Json(serde_json::json!({
                    "chat_id": "c-9",
                    "ready_to_search": true,
                    "summary": "graph neural networks",
                }))
            }),
        )
        .route(
            "/stream_search",
            post(|| async {
                stream_then_reset(
                    "{\"type\":\"papers\",\"data\":[{\"paper_id\":\"g1\",\"title\":\"Graphs\"}]}\n",
                )
            }),
        );
    let addr = serve(app).await;

    let out = run(addr, &["--json", "chat", "find me GNN papers"]).await;
    assert!(!out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse chat json");
    assert_eq!(v["ok"].as_bool(), Some(false));
    assert_eq!(v["error"]["code"].as_str(), Some("transport_failed"));
    assert_eq!(v["chat_id"].as_str(), Some("c-9"));
    assert_eq!(v["search_query"].as_str(), Some("graph neural networks"));
    assert_eq!(ids(&v["results"]), vec!["g1"]);

    let out = run(addr, &["chat", "find me GNN papers"]).await;
    assert!(!out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Graphs"), "{stdout}");
    assert!(String::from_utf8_lossy(&out.stderr).contains("error:"));
}

#[tokio::test]
async fn chat_backend_error_fails() {
    let app = Router::new().route(
        "/chat",
        post(|| async { Json(serde_json::json!({"error": "chat not found"})) }),
    );
    let addr = serve(app).await;

    let out = run(addr, &["--json", "chat", "hello"]).await;
    assert!(!out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse error json");
    assert_eq!(v["error"]["code"].as_str(), Some("backend_error"));
}

#[tokio::test]
async fn timeline_posts_saved_records() {
    let app = Router::new().route(
        "/generate_timeline",
        post(|Json(body): Json<serde_json::Value>| async move {
            assert_eq!(body["papers"].as_array().map(Vec::len), Some(2));
            Json(serde_json::json!({"timeline": "## 2019\n- Beta"}))
        }),
    );
    let addr = serve(app).await;
    let tmp = tempfile::tempdir().unwrap();
    let papers = tmp.path().join("papers.json");
    std::fs::write(
        &papers,
        r#"{"papers":[{"paper_id":"A","title":"Alpha"},{"paper_id":"B","title":"Beta"}]}"#,
    )
    .unwrap();

    let out = run(addr, &["timeline", "--papers", papers.to_str().unwrap()]).await;
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "## 2019\n- Beta\n");

    let empty = tmp.path().join("empty.json");
    std::fs::write(&empty, "[]").unwrap();
    let out = run(addr, &["--json", "future-work", "--papers", empty.to_str().unwrap()]).await;
    assert!(!out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse error json");
    assert_eq!(v["error"]["code"].as_str(), Some("invalid_params"));
    assert!(v["error"]["message"]
        .as_str()
        .unwrap()
        .contains("No papers available to generate future work ideas"));
}
