//! End-to-end engine tests: stub collaborators, in-memory store, real
//! walker and service.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use flashfusion_core::error::EngineError;
use flashfusion_core::traits::{HttpClient, LlmClient, WorkflowStore};
use flashfusion_core::types::{
    Edge, ExecutionStatus, Node, NodeKind, StepStatus, Workflow, WorkflowId,
};
use flashfusion_engine::ExecutionService;
use flashfusion_store::SqliteStore;
use flashfusion_test_utils::{condition, end, init_tracing, trigger, workflow, StubHttpClient, StubLlmClient};

struct Harness {
    store: Arc<SqliteStore>,
    llm: Arc<StubLlmClient>,
    http: Arc<StubHttpClient>,
    service: ExecutionService,
}

fn harness(llm: StubLlmClient, http: StubHttpClient) -> Harness {
    init_tracing();
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let llm = Arc::new(llm);
    let http = Arc::new(http);
    let service = ExecutionService::new(
        store.clone() as Arc<dyn WorkflowStore>,
        llm.clone() as Arc<dyn LlmClient>,
        http.clone() as Arc<dyn HttpClient>,
    );
    Harness {
        store,
        llm,
        http,
        service,
    }
}

fn default_harness() -> Harness {
    harness(
        StubLlmClient::always(json!("stub response")),
        StubHttpClient::always(200, json!({})),
    )
}

async fn save(h: &Harness, wf: &Workflow) {
    h.store.save_workflow(wf).await.unwrap();
}

fn input(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[tokio::test]
async fn merge_pipeline_completes_with_full_log() {
    // trigger → transform(merge a, b) → end
    let h = default_harness();
    let wf = workflow(
        "merge-pipeline",
        vec![
            trigger("start"),
            Node::new("combine", NodeKind::Transform)
                .with_config(json!({"operation": "merge", "sources": ["a", "b"]})),
            end("finish"),
        ],
        vec![Edge::new("start", "combine"), Edge::new("combine", "finish")],
    );
    save(&h, &wf).await;

    let outcome = h
        .service
        .execute_workflow(
            &wf.id,
            input(&[("a", json!({"x": 1})), ("b", json!({"y": 2}))]),
        )
        .await
        .unwrap();

    assert_eq!(outcome.output["merged"], json!({"x": 1, "y": 2}));

    let execution = h
        .store
        .load_execution(&outcome.execution_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.execution_log.len(), 3);
    assert!(execution
        .execution_log
        .iter()
        .all(|e| e.status == StepStatus::Completed));
    assert_eq!(execution.current_node.as_deref(), Some("finish"));
    assert!(execution.duration_ms.is_some());
    assert_eq!(
        execution.output_data.unwrap()["merged"],
        json!({"x": 1, "y": 2})
    );
}

#[tokio::test]
async fn condition_takes_the_true_branch() {
    // trigger → condition(count > 5) → [true: end_a, false: end_b]
    let h = default_harness();
    let wf = workflow(
        "branching",
        vec![
            trigger("start"),
            condition("check", "count > 5"),
            end("end_a"),
            end("end_b"),
        ],
        vec![
            Edge::new("start", "check"),
            Edge::branch("check", "end_a", "true"),
            Edge::branch("check", "end_b", "false"),
        ],
    );
    save(&h, &wf).await;

    let outcome = h
        .service
        .execute_workflow(&wf.id, input(&[("count", json!(10))]))
        .await
        .unwrap();

    assert_eq!(outcome.output["condition_result"], json!(true));

    let execution = h
        .store
        .load_execution(&outcome.execution_id)
        .await
        .unwrap()
        .unwrap();
    let visited: Vec<&str> = execution
        .execution_log
        .iter()
        .map(|e| e.node_id.as_str())
        .collect();
    assert_eq!(visited, vec!["start", "check", "end_a"]);
    assert_eq!(
        execution.execution_log[1].output.as_ref().unwrap()["condition_result"],
        json!(true)
    );
}

#[tokio::test]
async fn condition_takes_the_false_branch() {
    let h = default_harness();
    let wf = workflow(
        "branching",
        vec![
            trigger("start"),
            condition("check", "count > 5"),
            end("end_a"),
            end("end_b"),
        ],
        vec![
            Edge::new("start", "check"),
            Edge::branch("check", "end_a", "true"),
            Edge::branch("check", "end_b", "false"),
        ],
    );
    save(&h, &wf).await;

    let outcome = h
        .service
        .execute_workflow(&wf.id, input(&[("count", json!(2))]))
        .await
        .unwrap();

    let execution = h
        .store
        .load_execution(&outcome.execution_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(execution.execution_log.last().unwrap().node_id, "end_b");
}

#[tokio::test]
async fn api_call_failure_fails_the_run() {
    // trigger → api_call against a dead endpoint
    let h = harness(
        StubLlmClient::always(json!("unused")),
        StubHttpClient::failing("connection refused"),
    );
    let wf = workflow(
        "doomed-fetch",
        vec![
            trigger("start"),
            Node::new("fetch", NodeKind::ApiCall)
                .with_config(json!({"endpoint": "https://api.example.com/users"})),
        ],
        vec![Edge::new("start", "fetch")],
    );
    save(&h, &wf).await;

    let err = h
        .service
        .execute_workflow(&wf.id, HashMap::new())
        .await
        .unwrap_err();
    match &err {
        EngineError::NodeExecution { node_id, message } => {
            assert_eq!(node_id, "fetch");
            assert!(message.contains("connection refused"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // The failure is persisted before it propagates.
    let execution = latest_execution(&h, &wf.id).await;
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error_message.unwrap().contains("connection refused"));
    let last = execution.execution_log.last().unwrap();
    assert_eq!(last.node_id, "fetch");
    assert_eq!(last.status, StepStatus::Failed);
    assert!(last.output.is_none());
}

#[tokio::test]
async fn revisiting_a_node_is_a_circular_dependency() {
    // start → a → b → a
    let h = default_harness();
    let wf = workflow(
        "looping",
        vec![
            trigger("start"),
            condition("a", "true"),
            condition("b", "true"),
        ],
        vec![
            Edge::new("start", "a"),
            Edge::new("a", "b"),
            Edge::new("b", "a"),
        ],
    );
    save(&h, &wf).await;

    let err = h
        .service
        .execute_workflow(&wf.id, HashMap::new())
        .await
        .unwrap_err();
    match &err {
        EngineError::CircularDependency(node_id) => assert_eq!(node_id, "a"),
        other => panic!("unexpected error: {other}"),
    }

    let execution = latest_execution(&h, &wf.id).await;
    assert_eq!(execution.status, ExecutionStatus::Failed);
    // start, a, b all ran once before the revisit was caught.
    assert_eq!(execution.execution_log.len(), 3);
}

#[tokio::test]
async fn missing_trigger_fails_before_any_node_runs() {
    let h = default_harness();
    let wf = workflow(
        "no-entry",
        vec![end("finish")],
        vec![],
    );
    save(&h, &wf).await;

    let err = h
        .service
        .execute_workflow(&wf.id, HashMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingTrigger));

    let execution = latest_execution(&h, &wf.id).await;
    assert!(execution.execution_log.is_empty());
    assert_eq!(execution.status, ExecutionStatus::Failed);
}

#[tokio::test]
async fn multiple_triggers_fail_fast() {
    let h = default_harness();
    let wf = workflow(
        "two-entries",
        vec![trigger("start_a"), trigger("start_b"), end("finish")],
        vec![Edge::new("start_a", "finish")],
    );
    save(&h, &wf).await;

    let err = h
        .service
        .execute_workflow(&wf.id, HashMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MultipleTriggers(2)));
}

#[tokio::test]
async fn unknown_node_type_fails_dispatch() {
    let h = default_harness();
    let wf = workflow(
        "mystery",
        vec![trigger("start"), Node::new("odd", NodeKind::Other("webhook".to_string()))],
        vec![Edge::new("start", "odd")],
    );
    save(&h, &wf).await;

    let err = h
        .service
        .execute_workflow(&wf.id, HashMap::new())
        .await
        .unwrap_err();
    match &err {
        EngineError::UnknownNodeType(kind) => assert_eq!(kind, "webhook"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_workflow_is_not_found() {
    let h = default_harness();
    let err = h
        .service
        .execute_workflow(&WorkflowId::from_string("ghost"), HashMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::WorkflowNotFound(_)));
}

#[tokio::test]
async fn final_context_is_a_superset_of_the_seed() {
    let h = default_harness();
    let mut wf = workflow(
        "seeded",
        vec![trigger("start"), condition("check", "count > 5"), end("finish")],
        vec![Edge::new("start", "check"), Edge::new("check", "finish")],
    );
    wf.variables.insert("topic".to_string(), json!("rust"));
    wf.variables.insert("count".to_string(), json!(1));
    save(&h, &wf).await;

    let outcome = h
        .service
        .execute_workflow(&wf.id, input(&[("count", json!(10))]))
        .await
        .unwrap();

    // Workflow variables survive; input wins on conflict.
    assert_eq!(outcome.output["topic"], json!("rust"));
    assert_eq!(outcome.output["count"], json!(10));
    assert_eq!(outcome.output["condition_result"], json!(true));
}

#[tokio::test]
async fn identical_runs_produce_identical_context() {
    let h = default_harness();
    let wf = workflow(
        "deterministic",
        vec![
            trigger("start"),
            Node::new("summarize", NodeKind::AiTask)
                .with_config(json!({"prompt": "Summarize {{topic}}", "outputVariable": "summary"})),
            end("finish"),
        ],
        vec![Edge::new("start", "summarize"), Edge::new("summarize", "finish")],
    );
    save(&h, &wf).await;

    let seed = input(&[("topic", json!("Rust async"))]);
    let first = h.service.execute_workflow(&wf.id, seed.clone()).await.unwrap();
    let second = h.service.execute_workflow(&wf.id, seed).await.unwrap();

    assert_ne!(first.execution_id, second.execution_id);
    assert_eq!(first.output, second.output);

    // Both runs saw the interpolated prompt.
    let prompts: Vec<String> = h.llm.requests().into_iter().map(|r| r.prompt).collect();
    assert_eq!(prompts, vec!["Summarize Rust async", "Summarize Rust async"]);
}

#[tokio::test]
async fn log_length_matches_visited_nodes_not_graph_size() {
    let h = default_harness();
    // "island" is never reachable from the trigger.
    let wf = workflow(
        "with-island",
        vec![trigger("start"), condition("check", "true"), end("finish"), end("island")],
        vec![Edge::new("start", "check"), Edge::new("check", "finish")],
    );
    save(&h, &wf).await;

    let outcome = h
        .service
        .execute_workflow(&wf.id, HashMap::new())
        .await
        .unwrap();

    let execution = h
        .store
        .load_execution(&outcome.execution_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(wf.nodes.len(), 4);
    assert_eq!(execution.execution_log.len(), 3);
}

#[tokio::test]
async fn api_call_pipeline_feeds_later_nodes() {
    // fetch a user, then branch on the response status
    let h = harness(
        StubLlmClient::always(json!("unused")),
        StubHttpClient::always(200, json!({"name": "Ada", "active": true})),
    );
    let wf = workflow(
        "fetch-and-check",
        vec![
            trigger("start"),
            Node::new("fetch", NodeKind::ApiCall).with_config(json!({
                "endpoint": "https://api.example.com/users/{{user_id}}",
                "outputVariable": "user"
            })),
            condition("active", "user.active == true && api_status == 200"),
            end("yes"),
            end("no"),
        ],
        vec![
            Edge::new("start", "fetch"),
            Edge::new("fetch", "active"),
            Edge::branch("active", "yes", "true"),
            Edge::branch("active", "no", "false"),
        ],
    );
    save(&h, &wf).await;

    let outcome = h
        .service
        .execute_workflow(&wf.id, input(&[("user_id", json!(7))]))
        .await
        .unwrap();

    assert_eq!(outcome.output["user"], json!({"name": "Ada", "active": true}));
    assert_eq!(outcome.output["api_status"], json!(200));
    assert_eq!(h.http.requests()[0].url, "https://api.example.com/users/7");

    let execution = h
        .store
        .load_execution(&outcome.execution_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(execution.execution_log.last().unwrap().node_id, "yes");
}

#[tokio::test]
async fn statistics_roll_across_mixed_outcomes() {
    // First run succeeds, second fails at the api_call node.
    let h = harness(
        StubLlmClient::always(json!("unused")),
        StubHttpClient::scripted(vec![
            Ok((200, json!({"ok": true}))),
            Err("connection reset".to_string()),
        ]),
    );
    let wf = workflow(
        "flaky",
        vec![
            trigger("start"),
            Node::new("fetch", NodeKind::ApiCall)
                .with_config(json!({"endpoint": "https://api.example.com/ping"})),
        ],
        vec![Edge::new("start", "fetch")],
    );
    save(&h, &wf).await;

    h.service.execute_workflow(&wf.id, HashMap::new()).await.unwrap();
    h.service
        .execute_workflow(&wf.id, HashMap::new())
        .await
        .unwrap_err();

    let loaded = h.store.load_workflow(&wf.id).await.unwrap().unwrap();
    assert_eq!(loaded.stats.execution_count, 2);
    assert!((loaded.stats.success_rate - 0.5).abs() < 1e-9);
    assert!(loaded.stats.last_executed.is_some());
}

#[tokio::test]
async fn transform_failure_names_the_node() {
    let h = default_harness();
    let wf = workflow(
        "bad-transform",
        vec![
            trigger("start"),
            Node::new("reshape", NodeKind::Transform).with_config(json!({
                "operation": "map",
                "inputVariable": "items",
                "expression": "item * 2"
            })),
        ],
        vec![Edge::new("start", "reshape")],
    );
    save(&h, &wf).await;

    // "items" is a string, not an array: hard failure, not a passthrough.
    let err = h
        .service
        .execute_workflow(&wf.id, input(&[("items", json!("oops"))]))
        .await
        .unwrap_err();
    match &err {
        EngineError::NodeExecution { node_id, message } => {
            assert_eq!(node_id, "reshape");
            assert!(message.contains("not an array"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn later_nodes_overwrite_earlier_context_keys() {
    let h = harness(
        StubLlmClient::scripted(vec![Ok(json!("first")), Ok(json!("second"))]),
        StubHttpClient::always(200, json!({})),
    );
    let wf = workflow(
        "overwriting",
        vec![
            trigger("start"),
            Node::new("one", NodeKind::AiTask)
                .with_config(json!({"prompt": "a", "outputVariable": "result"})),
            Node::new("two", NodeKind::AiTask)
                .with_config(json!({"prompt": "b", "outputVariable": "result"})),
        ],
        vec![Edge::new("start", "one"), Edge::new("one", "two")],
    );
    save(&h, &wf).await;

    let outcome = h
        .service
        .execute_workflow(&wf.id, HashMap::new())
        .await
        .unwrap();
    assert_eq!(outcome.output["result"], json!("second"));
}

async fn latest_execution(
    h: &Harness,
    workflow_id: &WorkflowId,
) -> flashfusion_core::types::WorkflowExecution {
    h.store
        .list_executions(workflow_id)
        .await
        .unwrap()
        .into_iter()
        .next()
        .expect("no execution recorded")
}
