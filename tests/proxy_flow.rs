//! End-to-end tests: client → proxy → mock backend, then the log files.

use chrono::Utc;
use std::fs;
use std::time::Duration;

use logging_proxy::config::ResourceConfig;

mod common;
use common::{client, closed_port, proxy_config, read_lines, start_mock_backend, start_proxy, MockReply};

fn fields(line: &str) -> Vec<&str> {
    line.split('\t').collect()
}

#[tokio::test]
async fn get_is_forwarded_and_logged_per_content_id() {
    let (backend, seen) = start_mock_backend(MockReply::ok("application/json", "{\"ok\":true}")).await;
    let dir = tempfile::tempdir().unwrap();
    let upstream = format!("http://{}/api/", backend);
    let (endpoint, addr) = start_proxy(proxy_config(
        dir.path(),
        vec![ResourceConfig::new("widgets", upstream)],
    ))
    .await;

    let res = client()
        .get(format!("http://{}/widgets/items/42", addr))
        .send()
        .await
        .expect("Proxy unreachable");
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "application/json");
    assert_eq!(res.text().await.unwrap(), "{\"ok\":true}");

    let received = seen.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].method, "GET");
    assert_eq!(received[0].target, "/api/items/42");

    let root = dir.path().join("widgets");
    let lines = read_lines(&root.join("42.log"));
    assert_eq!(lines.len(), 1);
    let f = fields(&lines[0]);
    assert_eq!(f.len(), 8);
    assert!(f[0].ends_with('Z'));
    assert_eq!(&f[1..7], ["42", "GET", "/widgets/items/42", "n/a", "HTTP 200", "{\"ok\":true}"]);
    assert!(f[7].ends_with("ms"));

    let shared = root.join(format!("widgets_{}.log", Utc::now().format("%Y%m%d")));
    assert_eq!(read_lines(&shared), lines);

    assert!(endpoint.stop().await);
}

#[tokio::test]
async fn status_suffix_logs_against_parent_id() {
    let (backend, seen) = start_mock_backend(MockReply::ok("text/plain", "done")).await;
    let dir = tempfile::tempdir().unwrap();
    let (endpoint, addr) = start_proxy(proxy_config(
        dir.path(),
        vec![ResourceConfig::new("widgets", format!("http://{}/api/", backend))],
    ))
    .await;

    let res = client()
        .get(format!("http://{}/widgets/42/Status", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(seen.lock().unwrap()[0].target, "/api/42/Status");

    let root = dir.path().join("widgets");
    let lines = read_lines(&root.join("42.log"));
    assert_eq!(lines.len(), 1);
    assert_eq!(fields(&lines[0])[1], "42");
    assert!(!root.join("Status.log").exists());

    endpoint.stop().await;
}

#[tokio::test]
async fn post_body_query_and_content_type_cross_the_proxy() {
    let (backend, seen) = start_mock_backend(MockReply::ok("text/plain", "stored\n")).await;
    let dir = tempfile::tempdir().unwrap();
    let (endpoint, addr) = start_proxy(proxy_config(
        dir.path(),
        vec![ResourceConfig::new("widgets", format!("http://{}/api/", backend))],
    ))
    .await;

    let res = client()
        .post(format!("http://{}/widgets/abcdefghij?x=1", addr))
        .header("content-type", "text/plain")
        .header("x-custom", "dropped")
        .body("hello\tworld")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let received = seen.lock().unwrap()[0].clone();
    assert_eq!(received.method, "POST");
    assert_eq!(received.target, "/api/abcdefghij?x=1");
    assert_eq!(received.content_type.as_deref(), Some("text/plain"));
    assert_eq!(received.body, "hello\tworld");

    let lines = read_lines(&dir.path().join("widgets/ab/abcd/abcdefghij.log"));
    assert_eq!(lines.len(), 1);
    let f = fields(&lines[0]);
    assert_eq!(&f[1..7], ["abcdefghij", "POST", "/widgets/abcdefghij?x=1", "hello world", "HTTP 200", "stored "]);

    endpoint.stop().await;
}

#[tokio::test]
async fn timeouts_map_to_per_method_statuses() {
    let (backend, _) = start_mock_backend(MockReply::slow(Duration::from_secs(3))).await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = proxy_config(
        dir.path(),
        vec![ResourceConfig::new("widgets", format!("http://{}/api/", backend))],
    );
    config.upstream.timeout_secs = 1;
    config.upstream.status_on_get_timeout = 504;
    config.upstream.status_on_put_post_timeout = 503;
    config.upstream.status_on_delete_timeout = 409;
    let (endpoint, addr) = start_proxy(config).await;

    let http = client();
    let (get, post, delete) = tokio::join!(
        http.get(format!("http://{}/widgets/g1", addr)).send(),
        http.post(format!("http://{}/widgets/p1", addr)).body("x").send(),
        http.delete(format!("http://{}/widgets/d1", addr)).send(),
    );
    assert_eq!(get.unwrap().status(), 504);
    assert_eq!(post.unwrap().status(), 503);
    assert_eq!(delete.unwrap().status(), 409);

    let root = dir.path().join("widgets");
    for id in ["g1", "p1", "d1"] {
        let lines = read_lines(&root.join(format!("{}.log", id)));
        assert_eq!(lines.len(), 1, "one line for {}", id);
        let f = fields(&lines[0]);
        assert_eq!(f[5], "Exception");
        assert_eq!(f[6], "The operation has timed out");
    }

    endpoint.stop().await;
}

#[tokio::test]
async fn refused_upstream_uses_the_same_status_table() {
    let dead = closed_port().await;
    let dir = tempfile::tempdir().unwrap();
    let mut resource = ResourceConfig::new("widgets", format!("http://{}/api/", dead));
    resource.status_on_get_timeout = Some(502);
    let (endpoint, addr) = start_proxy(proxy_config(dir.path(), vec![resource])).await;

    let res = client()
        .get(format!("http://{}/widgets/7", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 502);

    let lines = read_lines(&dir.path().join("widgets/7.log"));
    assert_eq!(lines.len(), 1);
    let f = fields(&lines[0]);
    assert_eq!(f[5], "Exception");
    assert_ne!(f[6], "The operation has timed out");
    assert_ne!(f[6], "n/a");

    endpoint.stop().await;
}

#[tokio::test]
async fn failure_before_upstream_call_is_a_500() {
    let (backend, seen) = start_mock_backend(MockReply::ok("text/plain", "unused")).await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = proxy_config(
        dir.path(),
        vec![ResourceConfig::new("widgets", format!("http://{}/api/", backend))],
    );
    config.upstream.max_body_bytes = 4;
    let (endpoint, addr) = start_proxy(config).await;

    let res = client()
        .put(format!("http://{}/widgets/x1", addr))
        .body("far too large")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 500);
    assert!(seen.lock().unwrap().is_empty());

    let lines = read_lines(&dir.path().join("widgets/x1.log"));
    assert_eq!(lines.len(), 1);
    let f = fields(&lines[0]);
    assert_eq!(f.len(), 2);
    assert!(f[1].starts_with("Exception handling request: "));

    endpoint.stop().await;
}

#[tokio::test]
async fn resources_share_a_port_and_match_case_insensitively() {
    let (widgets, _) = start_mock_backend(MockReply::ok("text/plain", "widget")).await;
    let (gadgets, _) = start_mock_backend(MockReply::ok("text/plain", "gadget")).await;
    let dir = tempfile::tempdir().unwrap();
    let (endpoint, addr) = start_proxy(proxy_config(
        dir.path(),
        vec![
            ResourceConfig::new("widgets", format!("http://{}/", widgets)),
            ResourceConfig::new("gadgets", format!("http://{}/", gadgets)),
        ],
    ))
    .await;
    assert_eq!(endpoint.local_addrs().len(), 1);

    let http = client();
    let body = http.get(format!("http://{}/GADGETS/9", addr)).send().await.unwrap().text().await.unwrap();
    assert_eq!(body, "gadget");
    let body = http.get(format!("http://{}/widgets/9", addr)).send().await.unwrap().text().await.unwrap();
    assert_eq!(body, "widget");

    let missing = http.get(format!("http://{}/nothing/9", addr)).send().await.unwrap();
    assert_eq!(missing.status(), 404);
    assert!(!dir.path().join("nothing").exists());

    assert_eq!(read_lines(&dir.path().join("gadgets/9.log")).len(), 1);
    assert_eq!(read_lines(&dir.path().join("widgets/9.log")).len(), 1);

    endpoint.stop().await;
}

#[tokio::test]
async fn legacy_file_is_migrated_before_append() {
    let (backend, _) = start_mock_backend(MockReply::ok("text/plain", "ok")).await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("widgets");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("abcdefghijk.log"), "old line\n").unwrap();

    let (endpoint, addr) = start_proxy(proxy_config(
        dir.path(),
        vec![ResourceConfig::new("widgets", format!("http://{}/", backend))],
    ))
    .await;

    let res = client()
        .get(format!("http://{}/widgets/abcdefghijk", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    assert!(!root.join("abcdefghijk.log").exists());
    let lines = read_lines(&root.join("ab/abcd/abcdefghijk.log"));
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "old line");
    assert_eq!(fields(&lines[1])[1], "abcdefghijk");

    endpoint.stop().await;
}

#[tokio::test]
async fn concurrent_requests_for_one_id_each_write_a_line() {
    let (backend, _) = start_mock_backend(MockReply::ok("text/plain", "ok")).await;
    let dir = tempfile::tempdir().unwrap();
    let (endpoint, addr) = start_proxy(proxy_config(
        dir.path(),
        vec![ResourceConfig::new("widgets", format!("http://{}/", backend))],
    ))
    .await;

    let http = client();
    let mut tasks = Vec::new();
    for _ in 0..20 {
        let http = http.clone();
        let url = format!("http://{}/widgets/shared-id-123", addr);
        tasks.push(tokio::spawn(async move { http.get(url).send().await.unwrap().status() }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), 200);
    }

    let lines = read_lines(&dir.path().join("widgets/sh/shar/shared-id-123.log"));
    assert_eq!(lines.len(), 20);
    assert!(lines.iter().all(|l| fields(l).len() == 8));

    endpoint.stop().await;
}

#[tokio::test]
async fn stop_refuses_new_connections() {
    let (backend, _) = start_mock_backend(MockReply::ok("text/plain", "ok")).await;
    let dir = tempfile::tempdir().unwrap();
    let (endpoint, addr) = start_proxy(proxy_config(
        dir.path(),
        vec![ResourceConfig::new("widgets", format!("http://{}/", backend))],
    ))
    .await;

    let res = client().get(format!("http://{}/widgets/1", addr)).send().await.unwrap();
    assert_eq!(res.status(), 200);

    assert!(endpoint.stop().await);
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn stop_waits_for_in_flight_requests() {
    let (backend, _) = start_mock_backend(MockReply::slow(Duration::from_millis(500))).await;
    let dir = tempfile::tempdir().unwrap();
    let (endpoint, addr) = start_proxy(proxy_config(
        dir.path(),
        vec![ResourceConfig::new("widgets", format!("http://{}/", backend))],
    ))
    .await;

    let http = client();
    let url = format!("http://{}/widgets/slow1", addr);
    let pending = tokio::spawn(async move { http.get(url).send().await.unwrap().status() });
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(endpoint.in_flight().active(), 1);

    assert!(endpoint.stop().await);
    assert_eq!(pending.await.unwrap(), 200);
    assert_eq!(read_lines(&dir.path().join("widgets/slow1.log")).len(), 1);
}

#[tokio::test]
async fn caller_hanging_up_does_not_cancel_the_transaction() {
    use tokio::io::AsyncWriteExt;

    let (backend, seen) = start_mock_backend(MockReply::slow(Duration::from_millis(500))).await;
    let dir = tempfile::tempdir().unwrap();
    let (endpoint, addr) = start_proxy(proxy_config(
        dir.path(),
        vec![ResourceConfig::new("widgets", format!("http://{}/", backend))],
    ))
    .await;

    let mut caller = tokio::net::TcpStream::connect(addr).await.unwrap();
    caller
        .write_all(b"GET /widgets/gone1 HTTP/1.1\r\nHost: proxy\r\n\r\n")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    drop(caller);

    // still counted until the upstream answers and the line is written
    assert_eq!(endpoint.in_flight().active(), 1);
    assert!(endpoint.in_flight().wait_idle(Duration::from_secs(5)).await);

    assert_eq!(seen.lock().unwrap().len(), 1);
    let lines = read_lines(&dir.path().join("widgets/gone1.log"));
    assert_eq!(lines.len(), 1);
    assert_eq!(fields(&lines[0])[5], "HTTP 200");

    assert!(endpoint.stop().await);
}
