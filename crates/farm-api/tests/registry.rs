//! End-to-end registry behavior against mock workers over HTTP

mod common;

use std::time::Duration;

use common::{CATALOGS, MockWorker, fast_registry, wait_until};
use farm_core::{Availability, Properties, Registry, Where, WorkerStatus};

async fn start_workers() -> Vec<MockWorker> {
    let mut workers = Vec::new();
    for (id, catalog) in ["w1", "w2", "w3"].into_iter().zip(CATALOGS) {
        workers.push(MockWorker::start(id, catalog).await);
    }
    workers
}

fn register_grouped(registry: &Registry, workers: &[MockWorker]) {
    for (i, worker) in workers.iter().enumerate() {
        let created = registry
            .register_url(
                &worker.url(),
                Some(Properties {
                    group: format!("group{}", i + 1),
                    priority: i as i64 + 1,
                    offline: false,
                }),
            )
            .unwrap();
        assert!(created);
    }
}

fn priorities(registry: &Registry, filter: Option<&Where>) -> Vec<i64> {
    registry.select(filter).iter().map(|w| w.priority()).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_farm_against_mock_workers() {
    let mut servers = start_workers().await;

    let farm = Registry::new();
    register_grouped(&farm, &servers);

    let farm2 = fast_registry();
    for server in &servers {
        farm2.register_url(&server.url(), None).unwrap();
        assert!(!farm2.register_url(&server.url(), None).unwrap());
    }
    assert!(farm2.register_url("\0", None).is_err());
    assert_eq!(farm2.len(), 3);

    // Wait for the first catalog poll of every worker
    assert!(wait_until(Duration::from_secs(5), || farm.all_models().len() == 16).await);
    assert!(wait_until(Duration::from_secs(5), || farm2.all_models().len() == 16).await);

    // Select
    assert!(farm.select(Some(&Where::new().with_group("group0"))).is_empty());
    assert_eq!(farm.select(Some(&Where::new().with_group("group1"))).len(), 1);

    let gemma = Where::new().with_model("gemma2:27b-text-q6_K");
    assert_eq!(priorities(&farm, Some(&gemma)), vec![1, 2]);
    assert_eq!(farm2.select(None).len(), 3);
    assert_eq!(farm2.select(Some(&gemma)).len(), 2);

    // First by group
    let worker = farm.first(Some(&Where::new().with_group("group2"))).unwrap();
    assert_eq!(worker.priority(), 2);
    assert!(worker.online());
    assert_eq!(worker.status(), WorkerStatus::Online);
    assert!(farm2.first(Some(&Where::new().with_group(""))).is_some());

    // First by model
    let missing = Where::new().with_model("do-not-find-nemo");
    assert!(farm.first(Some(&missing)).is_none());
    assert!(farm2.first(Some(&missing)).is_none());

    let nemo = Where::new().with_model("mistral-nemo:12b-instruct-2407-fp16");
    let worker = farm.first(Some(&nemo)).unwrap();
    assert!(farm2.first(Some(&nemo)).is_some());
    assert_eq!(worker.group(), "group2");
    assert_eq!(worker.client().version().await.unwrap(), "0.3.6");

    let details = worker.model("mistral-nemo:12b-instruct-2407-fp16").unwrap();
    assert_eq!(details.details.unwrap().parameter_size, "12.2B");

    // Model counts
    let counts = farm.model_counts(None);
    assert_eq!(counts.len(), 16);
    for model in [
        "llama3.1:8b-instruct-q4_0",
        "llama3.1:8b-instruct-q8_0",
        "nomic-embed-text:latest",
        "phi3.5:3.8b-mini-instruct-q4_0",
        "phi3.5:3.8b-mini-instruct-q8_0",
        "starcoder2:3b",
    ] {
        assert!(counts.contains_key(model), "missing {}", model);
    }
    assert_eq!(counts["gemma2:27b-text-q6_K"], 2);
    assert!(counts.values().all(|&c| (1..=3).contains(&c)));

    // Worker 2 goes away
    servers[1].close().await;
    assert!(
        wait_until(Duration::from_secs(6), || {
            farm.select(Some(&Where::new().with_group("group2"))).is_empty()
        })
        .await
    );
    assert!(wait_until(Duration::from_secs(6), || farm2.select(None).len() == 2).await);
    assert_eq!(priorities(&farm, None), vec![1, 3]);

    let offline = Where::new()
        .with_group("group2")
        .with_availability(Availability::Offline);
    assert_eq!(farm.select(Some(&offline)).len(), 1);

    // Models hosted only by worker 2 disappear from the catalog once its
    // catalog refresh fails
    assert!(
        wait_until(Duration::from_secs(3), || {
            !farm2.all_models().contains(&"llava:7b".to_string())
        })
        .await
    );
    assert!(farm2.all_models().contains(&"gemma2:27b-text-q6_K".to_string()));

    // Back-reference to the owning registry
    let worker = farm.first(Some(&Where::new().with_group("group1"))).unwrap();
    assert!(worker.registry().unwrap().ptr_eq(&farm));
    assert!(!worker.registry().unwrap().ptr_eq(&farm2));

    farm.shutdown();
    farm2.shutdown();
    for server in &mut servers {
        server.close().await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_worker_is_offline() {
    // Bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let farm = fast_registry();
    farm.register("ghost", &format!("http://{}", addr), None).unwrap();

    let ghost = farm.get("ghost").unwrap();
    assert!(wait_until(Duration::from_secs(3), || !ghost.online()).await);
    assert!(farm.select(None).is_empty());
    assert!(farm.all_models().is_empty());
    assert!(ghost.info().last_error.is_some());
}
