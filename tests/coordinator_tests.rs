//! End-to-end coordinator behavior against the mock backend

use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use xflow::coordinator::PresetGate;
use xflow::graph::{Node, NodeData, Port, Position, ENDNODE_FUNCTION_ID};
use xflow::notify::{NoticeKind, RecordingNotifier};
use xflow::{
    ExecuteOptions, ExecutionOutput, FlowError, MockWorkflowService, StreamEvent,
    WorkflowCoordinator, WorkflowGraph,
};

fn node(id: &str, function_id: &str) -> Node {
    Node {
        id: id.into(),
        data: NodeData::new(id, function_id),
        position: Position::default(),
    }
}

/// Graph ending in an endnode with a streaming input port
fn streaming_graph() -> WorkflowGraph {
    let mut end = node("end", ENDNODE_FUNCTION_ID);
    end.data.inputs.push(Port::new("in").streaming());
    WorkflowGraph {
        nodes: vec![node("llm", "llmnode"), end],
        ..Default::default()
    }
}

/// Graph ending in a plain endnode
fn buffered_graph() -> WorkflowGraph {
    let mut end = node("end", ENDNODE_FUNCTION_ID);
    end.data.inputs.push(Port::new("in"));
    WorkflowGraph {
        nodes: vec![node("llm", "llmnode"), end],
        ..Default::default()
    }
}

fn harness(
    mock: Arc<MockWorkflowService>,
) -> (WorkflowCoordinator, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::new());
    let coordinator =
        WorkflowCoordinator::new(mock, notifier.clone(), Arc::new(PresetGate::allow()));
    (coordinator, notifier)
}

#[tokio::test]
async fn streaming_graph_routes_to_stream_endpoint() {
    let mock = Arc::new(MockWorkflowService::new());
    mock.queue_chunks(&["Hel", "lo ", "world"]);
    let (coordinator, notifier) = harness(mock.clone());

    coordinator
        .execute(
            &streaming_graph(),
            "Stream Flow",
            ExecuteOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(mock.stream_count(), 1);
    assert_eq!(mock.execute_count(), 0);
    assert_eq!(
        coordinator.state().last_output,
        Some(ExecutionOutput::Stream("Hello world".into()))
    );
    // Chunks surface through the notifier sink as they arrive
    assert_eq!(notifier.count(NoticeKind::Chunk), 3);
}

#[tokio::test]
async fn buffered_graph_routes_to_buffered_endpoint() {
    let mock =
        Arc::new(MockWorkflowService::new().respond_to_execute(json!({"answer": "42"})));
    let (coordinator, _) = harness(mock.clone());

    coordinator
        .execute(
            &buffered_graph(),
            "Plain Flow",
            ExecuteOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(mock.execute_count(), 1);
    assert_eq!(mock.stream_count(), 0);
    assert_eq!(
        coordinator.state().last_output,
        Some(ExecutionOutput::Buffered(json!({"answer": "42"})))
    );
}

#[tokio::test]
async fn execute_saves_before_dispatching() {
    let mock = Arc::new(MockWorkflowService::new());
    let (coordinator, _) = harness(mock.clone());

    coordinator
        .execute(
            &buffered_graph(),
            "Persist First",
            ExecuteOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let saved = mock.saved_payloads();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].0, "Persist First");
    // The persisted payload carries the derived id and name
    assert_eq!(saved[0].1["workflow_name"], "Persist First");
    assert!(saved[0].1["workflow_id"]
        .as_str()
        .unwrap()
        .starts_with("workflow_"));
}

#[tokio::test]
async fn overwrite_declined_blocks_save() {
    let mock = Arc::new(MockWorkflowService::new().with_workflows(&["Mine.json"]));
    let gate = Arc::new(PresetGate::deny());
    let notifier = Arc::new(RecordingNotifier::new());
    let coordinator = WorkflowCoordinator::new(mock.clone(), notifier, gate.clone());

    let err = coordinator
        .save(&buffered_graph(), "Mine")
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::NameConflict { .. }));
    assert_eq!(gate.prompts(), vec!["Mine".to_string()]);
    assert_eq!(mock.save_count(), 0);
    assert!(!coordinator.state().is_busy());
}

#[tokio::test]
async fn overwrite_confirmed_persists() {
    let mock = Arc::new(MockWorkflowService::new().with_workflows(&["Mine.json"]));
    let (coordinator, notifier) = harness(mock.clone());

    coordinator.save(&buffered_graph(), "Mine").await.unwrap();
    assert_eq!(mock.save_count(), 1);
    assert_eq!(notifier.count(NoticeKind::Success), 1);
}

#[tokio::test]
async fn fresh_name_saves_without_prompting() {
    let mock = Arc::new(MockWorkflowService::new().with_workflows(&["Other.json"]));
    let gate = Arc::new(PresetGate::deny());
    let notifier = Arc::new(RecordingNotifier::new());
    let coordinator = WorkflowCoordinator::new(mock.clone(), notifier, gate.clone());

    coordinator.save(&buffered_graph(), "Mine").await.unwrap();
    assert!(gate.prompts().is_empty());
    assert_eq!(mock.save_count(), 1);
}

#[tokio::test]
async fn repeated_execution_is_idempotent_on_id() {
    let mock = Arc::new(MockWorkflowService::new());
    let (coordinator, _) = harness(mock.clone());
    let graph = buffered_graph();

    for _ in 0..2 {
        coordinator
            .execute(
                &graph,
                "Same",
                ExecuteOptions::default(),
                CancellationToken::new(),
            )
            .await
            .unwrap();
    }

    let saved = mock.saved_payloads();
    assert_eq!(saved.len(), 2);
    assert_eq!(saved[0].1["workflow_id"], saved[1].1["workflow_id"]);
    assert_eq!(mock.execute_count(), 2);
}

#[tokio::test]
async fn moving_nodes_does_not_change_identity() {
    let mock = Arc::new(MockWorkflowService::new());
    let (coordinator, _) = harness(mock.clone());

    let graph = buffered_graph();
    let mut moved = graph.clone();
    moved.nodes[0].position = Position { x: 250.0, y: -40.0 };
    moved.view.scale = 0.5;

    for g in [&graph, &moved] {
        coordinator
            .execute(g, "Same", ExecuteOptions::default(), CancellationToken::new())
            .await
            .unwrap();
    }

    let saved = mock.saved_payloads();
    assert_eq!(saved[0].1["workflow_id"], saved[1].1["workflow_id"]);
}

#[tokio::test]
async fn stream_end_notifies_success_exactly_once() {
    let mock = Arc::new(MockWorkflowService::new());
    mock.queue_chunks(&["a", "b"]);
    let (coordinator, notifier) = harness(mock.clone());

    coordinator
        .execute(
            &streaming_graph(),
            "W",
            ExecuteOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(notifier.count(NoticeKind::Success), 1);
    assert!(!coordinator.state().executing);
}

#[tokio::test]
async fn mid_stream_error_keeps_partial_output() {
    let mock = Arc::new(MockWorkflowService::new());
    mock.queue_stream(vec![
        Ok(StreamEvent::Chunk("partial ".into())),
        Err(FlowError::stream("node llm failed")),
    ]);
    let (coordinator, notifier) = harness(mock.clone());

    let err = coordinator
        .execute(
            &streaming_graph(),
            "W",
            ExecuteOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("node llm failed"));
    assert_eq!(notifier.count(NoticeKind::Error), 1);
    assert_eq!(notifier.count(NoticeKind::Success), 0);
    let state = coordinator.state();
    assert!(!state.executing);
    assert_eq!(
        state.last_output,
        Some(ExecutionOutput::Stream("partial ".into()))
    );
}

#[tokio::test]
async fn execute_failure_resets_busy_state() {
    let mock = Arc::new(MockWorkflowService::new());
    mock.fail_execute_with("backend exploded");
    let (coordinator, notifier) = harness(mock.clone());

    let err = coordinator
        .execute(
            &buffered_graph(),
            "W",
            ExecuteOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("backend exploded"));
    assert_eq!(notifier.count(NoticeKind::Error), 1);
    assert!(!coordinator.state().is_busy());
}

#[tokio::test]
async fn cancelled_token_aborts_streaming_execution() {
    let mock = Arc::new(MockWorkflowService::new());
    mock.queue_chunks(&["never", "seen"]);
    let (coordinator, _) = harness(mock.clone());

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = coordinator
        .execute(
            &streaming_graph(),
            "W",
            ExecuteOptions::default(),
            cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Canceled));
    assert!(!coordinator.state().executing);
}

#[tokio::test]
async fn empty_graph_never_reaches_the_backend() {
    let mock = Arc::new(MockWorkflowService::new());
    let (coordinator, _) = harness(mock.clone());

    let err = coordinator
        .execute(
            &WorkflowGraph::new(),
            "W",
            ExecuteOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Validation { .. }));
    assert_eq!(mock.save_count(), 0);
    assert_eq!(mock.execute_count(), 0);
    assert_eq!(mock.stream_count(), 0);
}

#[tokio::test]
async fn invalid_name_is_rejected_up_front() {
    let mock = Arc::new(MockWorkflowService::new());
    let (coordinator, _) = harness(mock.clone());

    let err = coordinator
        .save(&buffered_graph(), "../escape")
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Validation { .. }));
    assert_eq!(mock.save_count(), 0);
}
