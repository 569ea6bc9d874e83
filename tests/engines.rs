//! End-to-end tests run against both engines over real sockets.

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use http_engine::config::{Config, EngineKind};
use http_engine::engine::{handler_fn, Engine, EngineError, Header};
use http_engine::testing::CapturedLogs;
use http_engine::{BufferedEngine, StandardEngine};

mod common;

const KINDS: [EngineKind; 2] = [EngineKind::Standard, EngineKind::Buffered];

#[tokio::test(flavor = "multi_thread")]
async fn test_created_response_reaches_client() {
    for kind in KINDS {
        let seen = Arc::new(Mutex::new(None));
        let record = Arc::clone(&seen);
        let engine = common::spawn_engine(
            kind,
            common::test_config(),
            handler_fn(move |_req, res| {
                res.header().set("Content-Type", "text/plain").unwrap();
                res.write_header(201);
                res.write(b"ok").unwrap();
                *record.lock().unwrap() = Some((res.status(), res.size(), res.committed()));
            }),
        )
        .await;

        let response = common::client().post(engine.url("/")).send().await.unwrap();
        assert_eq!(response.status(), 201, "{kind}");
        assert_eq!(response.headers()["content-type"], "text/plain", "{kind}");
        assert_eq!(response.text().await.unwrap(), "ok", "{kind}");
        assert_eq!(*seen.lock().unwrap(), Some((201, 2, true)), "{kind}");

        engine.shutdown().await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_request_target_is_parsed() {
    for kind in KINDS {
        let engine = common::spawn_engine(
            kind,
            common::test_config(),
            handler_fn(|req, res| {
                let line = format!(
                    "{} {} {} active={} scheme={} remote_ip={}",
                    req.method(),
                    req.uri(),
                    req.url().path(),
                    req.url().query_value("active"),
                    req.scheme(),
                    req.remote_address().starts_with("127.0.0.1:"),
                );
                res.write(line.as_bytes()).unwrap();
            }),
        )
        .await;

        let body = common::client()
            .get(engine.url("/users?active=true"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(
            body,
            "GET /users?active=true /users active=true scheme=http remote_ip=true",
            "{kind}"
        );

        engine.shutdown().await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_request_body_round_trips() {
    let payload: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
    for kind in KINDS {
        let engine = common::spawn_engine(
            kind,
            common::test_config(),
            handler_fn(|req, res| {
                let mut body = Vec::new();
                req.body().read_to_end(&mut body).unwrap();
                req.body().close().unwrap();
                res.header()
                    .set("Content-Type", "application/octet-stream")
                    .unwrap();
                res.write(&body).unwrap();
            }),
        )
        .await;

        let response = common::client()
            .put(engine.url("/upload"))
            .body(payload.clone())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200, "{kind}");
        assert_eq!(response.bytes().await.unwrap().as_ref(), payload.as_slice(), "{kind}");

        engine.shutdown().await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_form_value_prefers_body() {
    for kind in KINDS {
        let engine = common::spawn_engine(
            kind,
            common::test_config(),
            handler_fn(|req, res| {
                let reply = format!("{}/{}", req.form_value("name"), req.form_value("page"));
                res.write(reply.as_bytes()).unwrap();
            }),
        )
        .await;

        let body = common::client()
            .post(engine.url("/submit?name=query&page=3"))
            .header("content-type", "application/x-www-form-urlencoded")
            .body("name=ada+lovelace")
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ada lovelace/3", "{kind}");

        engine.shutdown().await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_uncommitted_response_is_empty_200() {
    for kind in KINDS {
        let engine =
            common::spawn_engine(kind, common::test_config(), handler_fn(|_, _| {})).await;

        let response = common::client().get(engine.url("/")).send().await.unwrap();
        assert_eq!(response.status(), 200, "{kind}");
        assert!(response.bytes().await.unwrap().is_empty(), "{kind}");

        engine.shutdown().await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_handler_panic_becomes_500() {
    for kind in KINDS {
        let engine = common::spawn_engine(
            kind,
            common::test_config(),
            handler_fn(|req, _| {
                if req.url().path() == "/boom" {
                    panic!("handler failure");
                }
            }),
        )
        .await;

        let client = common::client();
        let response = client.get(engine.url("/boom")).send().await.unwrap();
        assert_eq!(response.status(), 500, "{kind}");

        // The engine keeps serving after a panic.
        let response = client.get(engine.url("/fine")).send().await.unwrap();
        assert_eq!(response.status(), 200, "{kind}");

        engine.shutdown().await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_handler_events_use_engine_logger() {
    for kind in KINDS {
        let logs = CapturedLogs::new();
        let engine = common::spawn_engine_with_logger(
            kind,
            common::test_config(),
            handler_fn(|req, res| {
                tracing::info!(path = req.url().path(), "inside handler");
                res.write(b"logged").unwrap();
            }),
            logs.logger(),
        )
        .await;

        let body = common::client()
            .get(engine.url("/traced"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "logged");
        engine.shutdown().await.unwrap();

        let text = logs.contents();
        assert!(text.contains("inside handler"), "{kind}: {text}");
        assert!(text.contains("/traced"), "{kind}: {text}");
        assert!(text.contains("Engine started"), "{kind}: {text}");
    }
}

#[tokio::test]
async fn test_serve_without_handler_fails() {
    let listener = common::ephemeral_listener().await;
    let err = StandardEngine::new(common::test_config())
        .serve(listener, std::future::pending())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingHandler));

    let listener = common::ephemeral_listener().await;
    let err = BufferedEngine::new(common::test_config())
        .serve(listener, std::future::pending())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingHandler));
}

#[tokio::test]
async fn test_missing_tls_files_fail_startup() {
    let config = Config {
        tls_certfile: "/nonexistent/cert.pem".into(),
        tls_keyfile: "/nonexistent/key.pem".into(),
        ..common::test_config()
    };

    let mut engine = StandardEngine::new(config.clone());
    engine.set_handler(Arc::new(handler_fn(|_, _| {})));
    let err = engine
        .serve(common::ephemeral_listener().await, std::future::pending())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Tls { .. }), "{err}");

    let mut engine = BufferedEngine::new(config);
    engine.set_handler(Arc::new(handler_fn(|_, _| {})));
    let err = engine
        .serve(common::ephemeral_listener().await, std::future::pending())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Tls { .. }), "{err}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_standard_streams_large_responses() {
    const CHUNK: usize = 16 * 1024;
    const CHUNKS: usize = 64;

    let engine = common::spawn_engine(
        EngineKind::Standard,
        common::test_config(),
        handler_fn(|_, res| {
            let chunk = vec![b'x'; CHUNK];
            for _ in 0..CHUNKS {
                res.write(&chunk).unwrap();
            }
            assert_eq!(res.size(), (CHUNK * CHUNKS) as u64);
        }),
    )
    .await;

    let body = common::client()
        .get(engine.url("/stream"))
        .send()
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(body.len(), CHUNK * CHUNKS);

    engine.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_standard_write_timeout_is_503() {
    let config = Config {
        write_timeout: Duration::from_millis(100),
        ..common::test_config()
    };
    let engine = common::spawn_engine(
        EngineKind::Standard,
        config,
        handler_fn(|_, res| {
            std::thread::sleep(Duration::from_millis(500));
            // The connection has already answered; the write fails.
            assert!(res.write(b"too late").is_err());
        }),
    )
    .await;

    let response = common::client().get(engine.url("/slow")).send().await.unwrap();
    assert_eq!(response.status(), 503);

    engine.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dot_segments_reach_handler_unchanged() {
    let target = "/static/../admin/%2e%2e/x?q=1";
    let request = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    for kind in KINDS {
        let engine = common::spawn_engine(
            kind,
            common::test_config(),
            handler_fn(|req, res| {
                let line = format!("[{}|{}]", req.url().path(), req.uri());
                res.write(line.as_bytes()).unwrap();
            }),
        )
        .await;

        let response = common::raw_exchange(engine.addr, request.as_bytes(), Some("]")).await;
        assert!(
            response.contains("[/static/../admin/%2e%2e/x|/static/../admin/%2e%2e/x?q=1]"),
            "{kind}: {response}"
        );

        engine.shutdown().await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_standard_panic_after_commit_truncates_body() {
    let engine = common::spawn_engine(
        EngineKind::Standard,
        common::test_config(),
        handler_fn(|_, res| {
            res.write(b"partial").unwrap();
            panic!("handler failure after commit");
        }),
    )
    .await;

    let request = b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
    let response = common::raw_exchange(engine.addr, request, None).await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("partial"), "{response}");
    assert!(!response.ends_with("0\r\n\r\n"), "{response}");

    engine.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_standard_stalled_body_times_out() {
    let config = Config {
        read_timeout: Duration::from_millis(300),
        ..common::test_config()
    };
    let engine = common::spawn_engine(
        EngineKind::Standard,
        config,
        handler_fn(|req, res| {
            let mut body = Vec::new();
            let outcome = match req.body().read_to_end(&mut body) {
                Ok(n) => format!("read {n}"),
                Err(e) => format!("{:?}", e.kind()),
            };
            res.write(outcome.as_bytes()).unwrap();
        }),
    )
    .await;

    let request =
        b"POST /upload HTTP/1.1\r\nHost: localhost\r\nContent-Length: 100\r\nConnection: close\r\n\r\nabc";
    let response = common::raw_exchange(engine.addr, request, Some("TimedOut")).await;
    assert!(response.contains("TimedOut"), "{response}");

    engine.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_buffered_stalled_body_is_408() {
    let config = Config {
        read_timeout: Duration::from_millis(300),
        ..common::test_config()
    };
    let engine = common::spawn_engine(
        EngineKind::Buffered,
        config,
        handler_fn(|_, res| {
            res.write(b"unreachable").unwrap();
        }),
    )
    .await;

    let request =
        b"POST /upload HTTP/1.1\r\nHost: localhost\r\nContent-Length: 100\r\nConnection: close\r\n\r\nabc";
    let response = common::raw_exchange(engine.addr, request, Some("\r\n")).await;
    assert!(response.starts_with("HTTP/1.1 408"), "{response}");

    engine.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_buffered_write_timeout_is_408() {
    let config = Config {
        write_timeout: Duration::from_millis(200),
        ..common::test_config()
    };
    let engine = common::spawn_engine(
        EngineKind::Buffered,
        config,
        handler_fn(|_, res| {
            std::thread::sleep(Duration::from_millis(800));
            res.write(b"too late").unwrap();
        }),
    )
    .await;

    let response = common::client().get(engine.url("/slow")).send().await.unwrap();
    assert_eq!(response.status(), 408);

    engine.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_drain_is_bounded() {
    const DRAIN: Duration = Duration::from_millis(500);

    for kind in KINDS {
        let (started_tx, started_rx) = std::sync::mpsc::channel::<()>();
        let started_tx = Mutex::new(started_tx);
        let engine = common::spawn_engine_draining(
            kind,
            common::test_config(),
            handler_fn(move |_, res| {
                let _ = started_tx.lock().unwrap().send(());
                std::thread::sleep(Duration::from_secs(3));
                let _ = res.write(b"late");
            }),
            http_engine::Logger::current(),
            DRAIN,
        )
        .await;

        let addr = engine.addr;
        let client = tokio::spawn(async move {
            let request = b"GET /stuck HTTP/1.1\r\nHost: localhost\r\n\r\n";
            common::raw_exchange(addr, request, Some("late")).await
        });
        tokio::task::spawn_blocking(move || started_rx.recv_timeout(Duration::from_secs(5)))
            .await
            .unwrap()
            .unwrap();

        let start = std::time::Instant::now();
        engine.shutdown().await.unwrap();
        assert!(
            start.elapsed() < DRAIN + Duration::from_millis(1500),
            "{kind}: shutdown took {:?}",
            start.elapsed()
        );
        client.abort();
    }
}

#[tokio::test]
async fn test_start_inside_runtime_is_an_error() {
    let mut engine = StandardEngine::new(common::test_config());
    engine.set_handler(Arc::new(handler_fn(|_, _| {})));
    assert!(matches!(engine.start(), Err(EngineError::NestedRuntime)));

    let mut engine = BufferedEngine::new(common::test_config());
    engine.set_handler(Arc::new(handler_fn(|_, _| {})));
    assert!(matches!(engine.start(), Err(EngineError::NestedRuntime)));
}
