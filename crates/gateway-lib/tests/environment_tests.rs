//! Integration tests for the gateway environment against a mock metrics
//! proxy and mock pods

use async_trait::async_trait;
use gateway_lib::actuator::TrafficPolicyPatcher;
use gateway_lib::observation::{AVG_QUEUE_RATIO, MAX_STALENESS_RATIO};
use gateway_lib::{
    metric, ClassWeights, GatewayEnvironment, ImportanceParameters, PodDirectory, Settings,
    SloPlan, SloUpdate, TransportError, WeightPlan,
};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Records patches and fails for the classes it is told to
#[derive(Default)]
struct RecordingPatcher {
    patched: Mutex<Vec<(String, u64)>>,
    failing: Vec<String>,
}

impl RecordingPatcher {
    fn failing(classes: &[&str]) -> Self {
        Self {
            patched: Mutex::new(Vec::new()),
            failing: classes.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn patched(&self) -> Vec<(String, u64)> {
        self.patched.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrafficPolicyPatcher for RecordingPatcher {
    async fn patch_token_bucket(&self, class: &str, tokens: u64) -> Result<(), TransportError> {
        self.patched.lock().unwrap().push((class.to_string(), tokens));
        if self.failing.iter().any(|c| c == class) {
            return Err(TransportError::KubeClient(format!("no policy for {}", class)));
        }
        Ok(())
    }
}

fn server_port(server: &ServerGuard) -> u16 {
    server
        .host_with_port()
        .rsplit_once(':')
        .and_then(|(_, p)| p.parse().ok())
        .unwrap()
}

fn settings_for(server: &ServerGuard) -> Settings {
    Settings {
        metrics_endpoint: server.url(),
        pod_port: server_port(server),
        request_timeout_secs: 5,
        source_counts: BTreeMap::from([("gold".to_string(), 1), ("silver".to_string(), 2)]),
        ..Settings::default()
    }
}

fn environment(server: &ServerGuard, patcher: Arc<RecordingPatcher>) -> GatewayEnvironment {
    GatewayEnvironment::new(settings_for(server), patcher).unwrap()
}

fn local_pods(entries: &[(&str, &str)]) -> PodDirectory {
    let mut pods = PodDirectory::new();
    for (class, pod) in entries {
        pods.entry(class.to_string())
            .or_default()
            .insert(pod.to_string(), Some("127.0.0.1".to_string()));
    }
    pods
}

async fn mock_observations(server: &mut ServerGuard) -> (mockito::Mock, mockito::Mock) {
    let primary = server
        .mock("POST", "/observations")
        .match_body(Matcher::PartialJson(json!({"queries": metric::PRIMARY_QUERIES})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "forwarded_batches": {"class=gold,pod=p1,source=s1": 10, "class=silver,pod=p2,source=a": 0},
                "dropped_batches": {"class=gold,pod=p1,source=s1": 5},
                "fresh_good_batches": {"class=gold,pod=p1,source=s1": 2},
                "queue_length": {"class=gold,pod=p1,source=s1": 3, "class=silver,pod=p2,source=a": 10}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let class_level = server
        .mock("POST", "/observations")
        .match_body(Matcher::PartialJson(json!({"queries": metric::CLASS_QUERIES})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "demand_rate": {"class=gold,route=r1": 40.0, "class=bronze": 7.0},
                "rejection_rate": {"class=gold": 1.5}
            })
            .to_string(),
        )
        .create_async()
        .await;

    (primary, class_level)
}

#[tokio::test]
async fn test_observation_cycle_end_to_end() {
    let mut server = Server::new_async().await;
    let (primary, class_level) = mock_observations(&mut server).await;
    let mut env = environment(&server, Arc::new(RecordingPatcher::default()));

    let summary = env.get_observations(5).await.unwrap();

    primary.assert_async().await;
    class_level.assert_async().await;

    let leaf = env.observations().leaf("gold", "p1", "s1").unwrap();
    assert!((leaf.drop_ratio() - 1.0 / 3.0).abs() < 1e-9);
    assert!((leaf.staleness_ratio() - 0.8).abs() < 1e-9);
    assert!((leaf.queue_ratio() - 0.03).abs() < 1e-9);
    assert_eq!(leaf.starvation_flag(), 0.0);

    // silver: capacity 100 over 2 sources, nothing forwarded
    let silver = env.observations().leaf("silver", "p2", "a").unwrap();
    assert_eq!(silver.starvation_flag(), 1.0);
    assert!((silver.queue_ratio() - 0.2).abs() < 1e-9);

    assert!((summary["gold"][AVG_QUEUE_RATIO] - 0.03).abs() < 1e-9);
    assert_eq!(summary["gold"][metric::DEMAND_RATE], 40.0);
    assert_eq!(summary["gold"][metric::REJECTION_RATE], 1.5);
    assert_eq!(summary["silver"][MAX_STALENESS_RATIO], 1.0);
    assert_eq!(summary["bronze"].len(), 1);

    assert_eq!(env.metrics().observation_cycles(), 1);
    assert_eq!(env.metrics().degraded_fetches(), 0);

    let urgency = env.compute_source_weights().unwrap();
    assert_eq!(urgency["gold"]["p1"]["s1"], 1.0);
    assert_eq!(urgency["silver"]["p2"]["a"], 1.0);
}

#[tokio::test]
async fn test_failed_fetch_degrades_to_empty_observations() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/observations")
        .with_status(503)
        .expect(2)
        .create_async()
        .await;
    let mut env = environment(&server, Arc::new(RecordingPatcher::default()));

    let summary = env.get_observations(5).await.unwrap();

    assert!(summary.is_empty());
    assert!(env.observations().is_empty());
    assert_eq!(env.metrics().degraded_fetches(), 2);
    assert_eq!(env.metrics().observation_cycles(), 1);
}

#[tokio::test]
async fn test_missing_source_count_aborts_cycle() {
    let mut server = Server::new_async().await;
    let _mocks = mock_observations(&mut server).await;

    let mut settings = settings_for(&server);
    settings.source_counts.remove("silver");
    let mut env = GatewayEnvironment::new(settings, Arc::new(RecordingPatcher::default())).unwrap();

    let err = env.get_observations(5).await.unwrap_err();
    assert!(err.is_configuration());
    assert!(env.observations().is_empty());
}

#[tokio::test]
async fn test_scoring_revalidates_importance() {
    let mut server = Server::new_async().await;
    let _mocks = mock_observations(&mut server).await;
    let mut env = environment(&server, Arc::new(RecordingPatcher::default()));
    env.get_observations(5).await.unwrap();

    env.set_importance(ImportanceParameters::new(0.5, 0.3, 0.3));
    assert!(env.compute_source_weights().unwrap_err().is_validation());

    env.set_importance(ImportanceParameters::new(0.5, 0.3, 0.2));
    assert!(env.compute_source_weights().is_ok());
}

#[tokio::test]
async fn test_apply_rate_limits_isolates_failures() {
    let server = Server::new_async().await;
    let patcher = Arc::new(RecordingPatcher::failing(&["silver"]));
    let mut env = environment(&server, patcher.clone());

    let weights: ClassWeights = [("gold", 0.6), ("silver", 0.3), ("bronze", 0.1)]
        .into_iter()
        .collect();
    let report = env.apply_rate_limits(weights.clone()).await.unwrap();

    assert_eq!(report["gold"], Ok(600));
    assert_eq!(report["bronze"], Ok(100));
    assert!(report["silver"].as_ref().unwrap_err().contains("silver"));
    assert_eq!(patcher.patched().len(), 3);
    assert_eq!(env.class_weights(), &weights);
    assert_eq!(env.metrics().actuation_failures("rate_limit"), 1);
}

#[tokio::test]
async fn test_invalid_rate_limits_have_no_side_effects() {
    let server = Server::new_async().await;
    let patcher = Arc::new(RecordingPatcher::default());
    let mut env = environment(&server, patcher.clone());
    let before = env.class_weights().clone();

    let weights: ClassWeights = [("gold", 0.5), ("silver", 0.3), ("bronze", 0.3)]
        .into_iter()
        .collect();
    let err = env.apply_rate_limits(weights).await.unwrap_err();

    assert!(err.is_validation());
    assert!(patcher.patched().is_empty());
    assert_eq!(env.class_weights(), &before);
}

#[tokio::test]
async fn test_push_weights_updates_source_counts() {
    let mut server = Server::new_async().await;
    let accepted = server
        .mock("POST", "/update_weights")
        .match_body(Matcher::Json(json!({"weights": {"s1": 0.5, "s2": 0.25, "s3": 0.25}})))
        .with_status(200)
        .create_async()
        .await;
    let rejected = server
        .mock("POST", "/update_weights")
        .match_body(Matcher::Json(json!({"weights": {"a": 1.0}})))
        .with_status(500)
        .create_async()
        .await;

    let mut env = environment(&server, Arc::new(RecordingPatcher::default()));
    let mut pods = local_pods(&[("gold", "gold-1"), ("silver", "silver-1")]);
    pods.get_mut("gold").unwrap().insert("gold-pending".to_string(), None);
    env.set_pods(pods);

    let plan: WeightPlan = serde_json::from_value(json!({
        "gold": {
            "gold-1": {"s1": 0.5, "s2": 0.25, "s3": 0.25},
            "gold-pending": {"s1": 1.0}
        },
        "silver": {"silver-1": {"a": 1.0}}
    }))
    .unwrap();

    let report = env.push_weights_to_pods(&plan).await;

    accepted.assert_async().await;
    rejected.assert_async().await;
    assert_eq!(report.succeeded, vec!["gold/gold-1".to_string()]);
    assert_eq!(report.skipped, vec!["gold/gold-pending".to_string()]);
    assert!(report.failed.contains_key("silver/silver-1"));

    assert_eq!(env.source_counts()["gold"], 3);
    assert_eq!(env.source_counts()["silver"], 2);
    assert_eq!(env.metrics().actuation_failures("weights"), 1);
}

#[tokio::test]
async fn test_set_timeliness_slo_stores_and_pushes() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/slo/update")
        .match_body(Matcher::Json(json!({
            "updates": [
                {"source": "src1", "threshold": 15.0, "unit": "s"},
                {"source": "src2", "threshold": 800.0, "unit": "ms"}
            ]
        })))
        .with_status(200)
        .create_async()
        .await;

    let mut env = environment(&server, Arc::new(RecordingPatcher::default()));
    env.set_pods(local_pods(&[("gold", "gold-1")]));

    let plan = SloPlan::from([(
        "gold".to_string(),
        BTreeMap::from([(
            "gold-1".to_string(),
            vec![
                SloUpdate { source: "src1".to_string(), threshold: 15.0, unit: "s".to_string() },
                SloUpdate { source: "src2".to_string(), threshold: 800.0, unit: "ms".to_string() },
            ],
        )]),
    )]);

    let report = env.set_timeliness_slo(plan.clone()).await.unwrap();

    mock.assert_async().await;
    assert!(report.is_clean());
    assert_eq!(env.timeliness_slo(), &plan);
}

#[tokio::test]
async fn test_negative_slo_threshold_rejected() {
    let server = Server::new_async().await;
    let mut env = environment(&server, Arc::new(RecordingPatcher::default()));

    let plan = SloPlan::from([(
        "gold".to_string(),
        BTreeMap::from([(
            "gold-1".to_string(),
            vec![SloUpdate { source: "src1".to_string(), threshold: -1.0, unit: "s".to_string() }],
        )]),
    )]);

    assert!(env.set_timeliness_slo(plan).await.unwrap_err().is_validation());
    assert!(env.timeliness_slo().is_empty());
}

#[tokio::test]
async fn test_fetch_class_info_records_source_counts() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/weights")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"weights": {"src1": 0.6, "src2": 0.4}, "num_sources": 4}"#)
        .create_async()
        .await;

    let mut env = environment(&server, Arc::new(RecordingPatcher::default()));
    let mut pods = local_pods(&[("gold", "gold-1")]);
    pods.insert(
        "silver".to_string(),
        BTreeMap::from([("silver-1".to_string(), None)]),
    );
    env.set_pods(pods);

    let info = env.fetch_class_info().await;

    assert_eq!(info["gold"].num_sources, 4);
    assert_eq!(info["gold"].weights.as_ref().unwrap()["src1"], 0.6);
    assert_eq!(env.source_counts()["gold"], 4);

    // unreachable class keeps the configured count
    assert_eq!(info["silver"].weights, None);
    assert_eq!(info["silver"].num_sources, 2);
}

#[tokio::test]
async fn test_non_object_body_aborts_cycle() {
    let mut server = Server::new_async().await;
    let _mocks = mock_observations(&mut server).await;
    let mut env = environment(&server, Arc::new(RecordingPatcher::default()));
    env.get_observations(5).await.unwrap();
    let previous = env.observations().clone();

    server.reset();
    let _bad = server
        .mock("POST", "/observations")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[1,2,3]")
        .create_async()
        .await;

    let err = env.get_observations(5).await.unwrap_err();

    assert!(err.is_validation());
    assert_eq!(env.observations(), &previous);
    assert_eq!(env.metrics().degraded_fetches(), 0);
    assert_eq!(env.metrics().observation_cycles(), 1);
}

#[tokio::test]
async fn test_out_of_range_drop_budget_rejected() {
    let server = Server::new_async().await;
    let mut settings = settings_for(&server);
    settings.drop_budgets = BTreeMap::from([(
        "gold".to_string(),
        BTreeMap::from([("s1".to_string(), f64::NAN)]),
    )]);

    let err = GatewayEnvironment::new(settings, Arc::new(RecordingPatcher::default()))
        .err()
        .unwrap();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_capacity_drives_queue_ratio_and_tokens() {
    let mut server = Server::new_async().await;
    let _mocks = mock_observations(&mut server).await;
    let mut settings = settings_for(&server);
    settings.class_queue_capacity = 200.0;
    settings.total_ingestion_rate = 400.0;
    let mut env = GatewayEnvironment::new(settings, Arc::new(RecordingPatcher::default())).unwrap();

    assert_eq!(env.capacity().class_queue_capacity, 200.0);
    env.get_observations(5).await.unwrap();
    let leaf = env.observations().leaf("gold", "p1", "s1").unwrap();
    assert!((leaf.queue_ratio() - 0.015).abs() < 1e-9);

    let report = env.apply_rate_limits(ClassWeights::default()).await.unwrap();
    assert_eq!(report["gold"], Ok(200));
}
