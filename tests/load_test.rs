//! Load testing for the route chain over a live listener.

use std::time::{Duration, Instant};

use reactive_http::http::HttpError;
use reactive_http::{demo, Method, RouteBuilder, ServerRequest};

mod common;

#[tokio::test]
async fn test_load_performance() {
    // Slow bodies must not stall other requests
    let router = RouteBuilder::new()
        .if_method_and_uri_match(Method::Post, "/slow-upload", |req: ServerRequest| async move {
            let size = req.entity().as_bytes().await?.len();
            Ok::<_, HttpError>(req.respond().text(size.to_string()).ok())
        })
        .else_if_method_and_uri_match(Method::Get, "/health", |req: ServerRequest| async move {
            Ok::<_, HttpError>(req.respond().text("ok").ok())
        })
        .build()
        .unwrap();
    let (addr, shutdown) = common::start_server(common::test_config(), router).await;

    let concurrency = 20;
    let requests_per_task = 50;
    let total_requests = concurrency * requests_per_task;

    let client = reqwest::Client::new();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for task in 0..concurrency {
        let client = client.clone();
        let base = format!("http://{addr}");
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for i in 0..requests_per_task {
                let req_start = Instant::now();
                let result = if (task + i) % 5 == 0 {
                    client
                        .post(format!("{base}/slow-upload"))
                        .body(vec![7u8; 64 * 1024])
                        .send()
                        .await
                } else {
                    client.get(format!("{base}/health")).send().await
                };
                if let Ok(res) = result {
                    if res.status().is_success() && res.bytes().await.is_ok() {
                        latencies.push(req_start.elapsed());
                    }
                }
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }

    let duration = start.elapsed();
    let rps = total_requests as f64 / duration.as_secs_f64();

    assert_eq!(all_latencies.len(), total_requests, "every request should succeed");

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p95 = all_latencies[(all_latencies.len() as f64 * 0.95) as usize];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", rps);
    println!("P50 Latency:    {:?}", p50);
    println!("P95 Latency:    {:?}", p95);
    println!("P99 Latency:    {:?}", p99);
    println!("-------------------------\n");

    shutdown.trigger();
}

#[tokio::test]
async fn test_concurrent_bean_writes() {
    let (addr, shutdown) = common::start_server(common::test_config(), demo::router().unwrap()).await;
    let client = reqwest::Client::new();

    let mut tasks = Vec::new();
    for n in 0..25 {
        let client = client.clone();
        let url = format!("http://{addr}/users");
        tasks.push(tokio::spawn(async move {
            client
                .post(url)
                .json(&serde_json::json!({ "name": format!("user-{n}") }))
                .timeout(Duration::from_secs(5))
                .send()
                .await
                .map(|r| r.status().as_u16())
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), 201);
    }

    let users: Vec<demo::User> = client
        .get(format!("http://{addr}/users"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(users.len(), 25);
    let mut ids: Vec<u64> = users.iter().map(|u| u.id).collect();
    ids.dedup();
    assert_eq!(ids.len(), 25);

    shutdown.trigger();
}
