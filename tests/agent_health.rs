use mongodb_operator::agent::{agent_flags_env, HealthError, StartupParameter};
use mongodb_operator::{agent_flags, Health};

const HEALTH: &str = r#"{
  "statuses": {
    "my-rs-0": {"IsInGoalState": false, "LastMongoUpTime": 1700000000, "ExpectedToBeUp": true}
  },
  "mmsStatus": {
    "my-rs-0": {
      "name": "my-rs-0",
      "lastGoalVersionAchieved": 3,
      "plans": [
        {
          "started": "2024-01-01T00:00:00Z",
          "completed": "2024-01-01T00:01:00Z",
          "moves": [{"move": "Start", "steps": [{"step": "StartFresh", "started": "a", "completed": "b", "result": "success"}]}]
        },
        {
          "started": "2024-01-02T00:00:00Z",
          "completed": null,
          "moves": [
            {"move": "ChangeVersion", "steps": [
              {"step": "Stop", "started": "c", "completed": "d", "result": "success"},
              {"step": "StartWithNewVersion", "started": "e", "completed": null, "result": ""}
            ]}
          ]
        }
      ]
    },
    "my-rs-1": {"name": "my-rs-1", "lastGoalVersionAchieved": 3, "plans": []}
  }
}"#;

#[test]
fn version_change_past_stop_deletes_pod() {
    let health = Health::from_json(HEALTH).unwrap();
    assert!(health.should_delete_pod("my-rs-0").unwrap());
    assert!(!health.should_delete_pod("my-rs-1").unwrap());
    assert!(!health.healthiness["my-rs-0"].is_in_goal_state);
}

#[test]
fn unknown_host_is_an_error() {
    let health = Health::from_json(HEALTH).unwrap();
    assert!(matches!(
        health.should_delete_pod("my-rs-9"),
        Err(HealthError::UnknownHost { ref hostname }) if hostname == "my-rs-9"
    ));
    assert!(matches!(Health::from_json("{"), Err(HealthError::Decode(_))));
}

#[test]
fn current_step_is_the_last_started_one() {
    let health = Health::from_json(HEALTH).unwrap();
    let (step_move, step) = health.process_plans["my-rs-0"].current_step().unwrap();
    assert_eq!(step_move.name, "ChangeVersion");
    assert_eq!(step.step, "StartWithNewVersion");

    let raw = HEALTH.replace(
        r#"{"step": "StartWithNewVersion", "started": "e", "completed": null, "result": ""}"#,
        r#"{"step": "StartWithNewVersion", "started": null, "completed": null, "result": ""}"#,
    );
    let health = Health::from_json(&raw).unwrap();
    let (_, step) = health.process_plans["my-rs-0"].current_step().unwrap();
    assert_eq!(step.step, "Stop");
    assert!(step.completed.is_some());
}

#[test]
fn current_step_needs_an_unfinished_plan() {
    let health = Health::from_json(HEALTH).unwrap();
    assert!(matches!(
        health.process_plans["my-rs-1"].current_step(),
        Err(HealthError::NoPlans { ref process }) if process == "my-rs-1"
    ));

    let raw = HEALTH.replace(
        r#""started": "2024-01-02T00:00:00Z",
          "completed": null,"#,
        r#""started": "2024-01-02T00:00:00Z",
          "completed": "2024-01-02T00:05:00Z","#,
    );
    let health = Health::from_json(&raw).unwrap();
    let err = health.process_plans["my-rs-0"].current_step().unwrap_err();
    assert!(matches!(
        err,
        HealthError::PlanCompleted { ref completed, .. } if completed == "2024-01-02T00:05:00Z"
    ));
    assert!(err.to_string().contains("the last plan finished at 2024-01-02T00:05:00Z"));

    let raw = HEALTH
        .replace(r#""started": "c""#, r#""started": null"#)
        .replace(r#""started": "e""#, r#""started": null"#);
    let health = Health::from_json(&raw).unwrap();
    assert!(matches!(
        health.process_plans["my-rs-0"].current_step(),
        Err(HealthError::NoStartedStep { .. })
    ));
}

#[test]
fn agent_health_reports_exactly_one_process() {
    let health = Health::from_json(HEALTH).unwrap();
    assert!(matches!(
        health.current_step(),
        Err(HealthError::MultipleProcessStatuses { count: 2 })
    ));
    assert!(matches!(
        Health::default().current_step(),
        Err(HealthError::NoProcessStatus)
    ));

    let mut single = health.clone();
    single.process_plans.remove("my-rs-1");
    let (_, step) = single.current_step().unwrap();
    assert_eq!(step.step, "StartWithNewVersion");
}

#[test]
fn stop_without_success_keeps_pod() {
    let raw = HEALTH.replace(
        r#"{"step": "Stop", "started": "c", "completed": "d", "result": "success"}"#,
        r#"{"step": "Stop", "started": "c", "completed": null, "result": ""}"#,
    );
    let health = Health::from_json(&raw).unwrap();
    assert!(!health.should_delete_pod("my-rs-0").unwrap());
}

#[test]
fn startup_parameters_render_as_flags() {
    assert_eq!(agent_flags(&[]), "");
    let parameters = vec![
        StartupParameter::new("logLevel", "DEBUG"),
        StartupParameter::new("maxLogFileDurationHrs", "24"),
    ];
    assert_eq!(
        agent_flags(&parameters),
        " -logLevel DEBUG -maxLogFileDurationHrs 24"
    );
    let env = agent_flags_env(&parameters);
    assert_eq!(env.name, "AGENT_FLAGS");
    assert_eq!(env.value, " -logLevel DEBUG -maxLogFileDurationHrs 24");
}
