use hangar_core::prelude::ShutdownHandle;
use hangar_runner::fakes::{fast_config, FakeScheduler};
use hangar_runner::prelude::{ClusterDispatcher, ClusterError, PodPhase, UsageError};
use pretty_assertions::assert_eq;

fn scenarios(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn existing_namespace_fails_before_any_submission() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("commit123", dir.path());
    let scheduler = FakeScheduler::new(3, 1).with_namespace("commit123");

    let err = ClusterDispatcher::new(&scheduler, &config)
        .run_all(&scenarios(&["a", "b"]))
        .await
        .unwrap_err();

    assert_eq!(
        Some(&ClusterError::NamespaceExists {
            namespace: "commit123".to_string()
        }),
        err.downcast_ref::<ClusterError>()
    );
    assert!(scheduler.submitted().is_empty());
}

#[tokio::test]
async fn one_pod_per_scenario_in_the_run_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("Commit123", dir.path());
    let scheduler = FakeScheduler::new(3, 1);

    let submitted = ClusterDispatcher::new(&scheduler, &config)
        .run_all(&scenarios(&["wallet_test", "name_import"]))
        .await
        .unwrap();

    assert_eq!(scenarios(&["wallet_test", "name_import"]), submitted);
    assert!(scheduler.has_namespace("commit123"));

    let pods = scheduler.submitted();
    assert_eq!(2, pods.len());
    for pod in &pods {
        assert_eq!("commit123", pod.metadata.namespace);
        assert_eq!("Never", pod.spec.restart_policy);
        let env = &pod.spec.containers[0].env;
        assert!(env
            .iter()
            .any(|e| e.name == "TOTAL_SCENARIOS" && e.value == "2"));
    }
    assert_eq!("wallet-test-commit123", pods[0].metadata.name);
}

#[tokio::test]
async fn failed_submission_does_not_stop_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("abc123", dir.path());
    let scheduler = FakeScheduler::new(3, 1).refusing("b");

    let err = ClusterDispatcher::new(&scheduler, &config)
        .run_all(&scenarios(&["a", "b", "c"]))
        .await
        .unwrap_err();

    assert_eq!(
        Some(&ClusterError::SubmissionFailed {
            failed: 1,
            total: 3,
            scenarios: scenarios(&["b"]),
        }),
        err.downcast_ref::<ClusterError>()
    );
    let submitted = scheduler
        .submitted()
        .iter()
        .map(|p| p.scenario().to_string())
        .collect::<Vec<_>>();
    assert_eq!(scenarios(&["a", "c"]), submitted);
}

#[tokio::test]
async fn run_one_reuses_the_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("abc123", dir.path());
    let scheduler = FakeScheduler::new(3, 1).with_namespace("abc123");
    let dispatcher = ClusterDispatcher::new(&scheduler, &config);

    let err = dispatcher.run_one(Some("  ")).await.unwrap_err();
    assert!(err.downcast_ref::<UsageError>().is_some());

    let pod = dispatcher.run_one(Some("wallet_test")).await.unwrap();
    assert_eq!("wallet-test-abc123", pod);
    assert_eq!(1, scheduler.submitted().len());
}

#[tokio::test]
async fn wait_returns_once_every_pod_has_finished() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("abc123", dir.path());
    let scheduler = FakeScheduler::new(3, 4).failing("b");
    let dispatcher = ClusterDispatcher::new(&scheduler, &config);

    dispatcher.run_all(&scenarios(&["a", "b"])).await.unwrap();
    let pods = dispatcher
        .wait_for_completion(&mut ShutdownHandle::new().new_listener())
        .await
        .unwrap();

    let phases = pods
        .into_iter()
        .map(|p| (p.scenario, p.phase))
        .collect::<Vec<_>>();
    assert_eq!(
        vec![
            ("a".to_string(), PodPhase::Succeeded),
            ("b".to_string(), PodPhase::Failed),
        ],
        phases
    );
}

#[tokio::test]
async fn clean_deletes_the_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("abc123", dir.path());
    let scheduler = FakeScheduler::new(3, 1);
    let dispatcher = ClusterDispatcher::new(&scheduler, &config);

    dispatcher.run_all(&scenarios(&["a"])).await.unwrap();
    dispatcher.clean().await.unwrap();

    assert!(!scheduler.has_namespace("abc123"));
    // A fresh run of the same commit can start again
    dispatcher.run_all(&scenarios(&["a"])).await.unwrap();
}
