use hangar_core::prelude::{ShutdownHandle, WaitError};
use hangar_run_model::Outcome;
use hangar_runner::fakes::{fast_config, FakeEngine};
use hangar_runner::prelude::{LocalDispatcher, ScenarioCatalog, UsageError};
use pretty_assertions::assert_eq;

fn scenarios(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn concurrency_limit_is_never_exceeded() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("abc123", dir.path());
    let shutdown = ShutdownHandle::new();
    let names = (0..9).map(|i| format!("scenario_{i}")).collect::<Vec<_>>();

    for limit in 1..=4 {
        let engine = FakeEngine::new(10);
        let summary = LocalDispatcher::new(&engine, &config)
            .run_all(&names, limit, &mut shutdown.new_listener())
            .await
            .unwrap();

        assert_eq!(names, summary.launched);
        assert!(
            engine.max_active() <= limit,
            "{} units active with a limit of {}",
            engine.max_active(),
            limit
        );
        assert_eq!(limit, engine.max_active());
    }
}

#[tokio::test]
async fn zero_limit_is_treated_as_one() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("abc123", dir.path());
    let engine = FakeEngine::new(2);

    LocalDispatcher::new(&engine, &config)
        .run_all(
            &scenarios(&["a", "b"]),
            0,
            &mut ShutdownHandle::new().new_listener(),
        )
        .await
        .unwrap();

    assert_eq!(1, engine.max_active());
}

#[tokio::test]
async fn skipped_scenario_is_not_run_and_one_slot_runs_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("abc123", dir.path());
    std::fs::create_dir(&config.catalog_dir).unwrap();
    for file in ["a.py", "b.py", "c.py"] {
        std::fs::write(config.catalog_dir.join(file), "").unwrap();
    }
    std::fs::write(&config.skip_file, "b\n").unwrap();

    let scenarios = ScenarioCatalog::new(&config.catalog_dir, &config.skip_file)
        .list_scenarios()
        .unwrap();
    assert_eq!(vec!["a".to_string(), "c".to_string()], scenarios);

    let engine = FakeEngine::new(2);
    let dispatcher = LocalDispatcher::new(&engine, &config);
    dispatcher
        .run_all(&scenarios, 1, &mut ShutdownHandle::new().new_listener())
        .await
        .unwrap();

    assert_eq!(scenarios, engine.launched_scenarios());
    assert_eq!(1, engine.max_active());

    let executions = dispatcher.collect().await.unwrap();
    let a = &executions[0];
    let c = &executions[1];
    assert_eq!(Outcome::Success, a.outcome);
    assert_eq!(Outcome::Success, c.outcome);
    // c only started once a had finished
    assert!(a.finished_at.unwrap() <= c.started_at.unwrap());
}

#[tokio::test]
async fn units_are_named_and_given_the_run_environment() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("abc123", dir.path());
    let engine = FakeEngine::new(1);

    LocalDispatcher::new(&engine, &config)
        .run_all(
            &scenarios(&["wallet_test"]),
            2,
            &mut ShutdownHandle::new().new_listener(),
        )
        .await
        .unwrap();

    let launch = &engine.launches()[0];
    assert_eq!("wallet_test-abc123", launch.name);
    assert_eq!("abc123", launch.run_id);
    assert_eq!("hangar-scenarios:abc123", launch.image);
    assert!(launch
        .env
        .contains(&("TOTAL_SCENARIOS".to_string(), "1".to_string())));
    assert!(launch
        .env
        .contains(&("RUN_ID".to_string(), "abc123".to_string())));
}

#[tokio::test]
async fn failed_launch_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("abc123", dir.path());
    let engine = FakeEngine::new(1).refusing("b");

    let summary = LocalDispatcher::new(&engine, &config)
        .run_all(
            &scenarios(&["a", "b", "c"]),
            1,
            &mut ShutdownHandle::new().new_listener(),
        )
        .await
        .unwrap();

    assert_eq!(scenarios(&["a", "c"]), summary.launched);
    assert_eq!(scenarios(&["b"]), summary.failed_launches);
    assert_eq!(scenarios(&["a", "c"]), engine.launched_scenarios());
}

#[tokio::test]
async fn unit_left_by_a_failed_launch_does_not_hold_a_slot() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("abc123", dir.path());
    let engine = FakeEngine::new(1).stranding("b");
    let dispatcher = LocalDispatcher::new(&engine, &config);

    let summary = dispatcher
        .run_all(
            &scenarios(&["a", "b", "c"]),
            1,
            &mut ShutdownHandle::new().new_listener(),
        )
        .await
        .unwrap();

    assert_eq!(scenarios(&["a", "c"]), summary.launched);
    assert_eq!(scenarios(&["b"]), summary.failed_launches);
    assert_eq!(2, engine.unit_count());

    let collected = dispatcher
        .collect()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.scenario)
        .collect::<Vec<_>>();
    assert_eq!(scenarios(&["a", "c"]), collected);
}

#[tokio::test]
async fn outcomes_come_from_log_markers() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("abc123", dir.path());
    let engine = FakeEngine::new(1).failing("b").silent("c");
    let dispatcher = LocalDispatcher::new(&engine, &config);

    dispatcher
        .run_all(
            &scenarios(&["a", "b", "c"]),
            3,
            &mut ShutdownHandle::new().new_listener(),
        )
        .await
        .unwrap();

    let outcomes = dispatcher
        .collect()
        .await
        .unwrap()
        .into_iter()
        .map(|e| (e.scenario, e.outcome))
        .collect::<Vec<_>>();

    assert_eq!(
        vec![
            ("a".to_string(), Outcome::Success),
            ("b".to_string(), Outcome::Failure),
            ("c".to_string(), Outcome::Unknown),
        ],
        outcomes
    );
}

#[tokio::test]
async fn wait_gives_up_at_the_run_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fast_config("abc123", dir.path());
    config.run_timeout = Some(std::time::Duration::from_millis(50));
    // Never finishes within the timeout
    let engine = FakeEngine::new(usize::MAX);

    let err = LocalDispatcher::new(&engine, &config)
        .run_all(
            &scenarios(&["a"]),
            1,
            &mut ShutdownHandle::new().new_listener(),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(err.downcast_ref::<WaitError>(), Some(WaitError::TimedOut { .. })),
        "{err:?}"
    );
}

#[tokio::test]
async fn shutdown_cancels_the_wait() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fast_config("abc123", dir.path());
    config.run_timeout = None;
    let engine = FakeEngine::new(usize::MAX);
    let shutdown = ShutdownHandle::new();
    let mut listener = shutdown.new_listener();

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        trigger.shutdown();
    });

    let err = LocalDispatcher::new(&engine, &config)
        .run_all(&scenarios(&["a"]), 1, &mut listener)
        .await
        .unwrap_err();

    assert!(
        matches!(err.downcast_ref::<WaitError>(), Some(WaitError::Cancelled { .. })),
        "{err:?}"
    );
}

#[tokio::test]
async fn run_one_requires_a_name() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("abc123", dir.path());
    let engine = FakeEngine::new(1);
    let dispatcher = LocalDispatcher::new(&engine, &config);

    let err = dispatcher.run_one(None).await.unwrap_err();
    assert_eq!(
        Some(&UsageError::MissingScenarioName),
        err.downcast_ref::<UsageError>()
    );
    assert_eq!(0, engine.unit_count());

    dispatcher.run_one(Some("wallet_test")).await.unwrap();
    assert_eq!(vec!["wallet_test".to_string()], engine.launched_scenarios());
}

#[tokio::test]
async fn clean_removes_every_unit_of_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("abc123", dir.path());
    let engine = FakeEngine::new(1);
    let dispatcher = LocalDispatcher::new(&engine, &config);

    dispatcher
        .run_all(
            &scenarios(&["a", "b"]),
            2,
            &mut ShutdownHandle::new().new_listener(),
        )
        .await
        .unwrap();

    assert_eq!(2, dispatcher.clean().await.unwrap());
    assert_eq!(0, engine.unit_count());
}
