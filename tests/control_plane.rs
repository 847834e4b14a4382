use std::io::Write;
use std::time::Duration;

use futures::StreamExt;
use pretty_assertions::assert_eq;
use rift::{CancelOutcome, ControlPlane, ExecError, ExecutionStatus, InferenceError, RiftConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn plane_with(tools: &[&str], base_url: &str) -> ControlPlane {
    let mut config = RiftConfig::default();
    config.tools.allowed = tools.iter().map(|tool| (*tool).to_string()).collect();
    config.tools.kill_grace_ms = 100;
    config.inference.base_url = base_url.to_string();
    config.inference.connect_timeout_seconds = 1;
    ControlPlane::new(config).expect("control plane")
}

fn script(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp script");
    file.write_all(body.as_bytes()).expect("write script");
    file.flush().expect("flush script");
    file
}

#[tokio::test]
async fn poll_observes_running_then_completed() {
    let file = script("echo scanning\nsleep 0.6\necho done\nexit 0\n");
    let plane = plane_with(&["sh"], "http://127.0.0.1:9");
    let id = plane
        .run_tool("sh", &file.path().display().to_string())
        .expect("start sh");

    let mut saw_running_with_output = false;
    let mut previous_stdout = String::new();
    let final_view = loop {
        let view = plane.get_tool_status(id.as_str()).expect("status");
        assert!(view.stdout.starts_with(&previous_stdout), "output must only grow");
        previous_stdout.clone_from(&view.stdout);

        if view.status == ExecutionStatus::Running && view.stdout == "scanning\n" {
            saw_running_with_output = true;
        }
        if view.status.is_terminal() {
            break view;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };

    assert!(saw_running_with_output);
    assert_eq!(final_view.status, ExecutionStatus::Completed);
    assert_eq!(final_view.stdout, "scanning\ndone\n");
    assert_eq!(final_view.exit_code, Some(0));
    assert!(final_view.end_time.is_some());
    assert!(final_view.duration_ms.is_some_and(|ms| ms >= 500));
}

#[tokio::test]
async fn forbidden_and_unknown_ids() {
    let plane = plane_with(&["dig"], "http://127.0.0.1:9");

    let err = plane.run_tool("bash", "-c id").expect_err("bash is not allowed");
    assert!(matches!(err, ExecError::Forbidden { .. }));
    assert!(plane.registry().is_empty());

    let err = plane.get_tool_status("exec-999-ffffffff").expect_err("unknown id");
    assert!(matches!(err, ExecError::NotFound { .. }));
    assert_eq!(plane.abort_tool("exec-999-ffffffff"), CancelOutcome::NotFound);
}

#[tokio::test]
async fn abort_is_immediate_and_idempotent() {
    let file = script("echo started\nsleep 30\n");
    let plane = plane_with(&["sh"], "http://127.0.0.1:9");
    let id = plane
        .run_tool("sh", &file.path().display().to_string())
        .expect("start sh");

    assert_eq!(plane.abort_tool(id.as_str()), CancelOutcome::Cancelled);
    let view = plane.get_tool_status(id.as_str()).expect("status");
    assert_eq!(view.status, ExecutionStatus::Failed);
    assert!(view.cancelled);
    assert_eq!(view.exit_code, Some(-1));

    assert_eq!(plane.abort_tool(id.as_str()), CancelOutcome::AlreadyTerminal);
    tokio::time::sleep(Duration::from_millis(300)).await;
    let later = plane.get_tool_status(id.as_str()).expect("status");
    assert_eq!(later.status, ExecutionStatus::Failed);
    assert!(later.stderr.starts_with(&view.stderr));
}

#[tokio::test]
async fn streams_tokens_from_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "{\"response\":\"Port 22 \"}\n{\"response\":\"is SSH.\"}\n{\"response\":\"\",\"done\":true}\n",
            "application/x-ndjson",
        ))
        .mount(&server)
        .await;

    let plane = plane_with(&["dig"], &server.uri());
    let mut stream = plane.send_ai_message("what is on port 22?").expect("valid prompt");

    let mut text = String::new();
    while let Some(item) = stream.next().await {
        text.push_str(&item.expect("token"));
    }
    assert_eq!(text, "Port 22 is SSH.");
    assert!(!plane.cancel_ai());
}

#[tokio::test]
async fn backend_down_surfaces_as_first_item() {
    let plane = plane_with(&["dig"], "http://127.0.0.1:9");

    let mut stream = plane.send_ai_message("hello").expect("valid prompt");
    let first = stream.next().await.expect("one item");
    assert!(matches!(first, Err(InferenceError::BackendUnavailable(_))));
    assert!(stream.next().await.is_none());

    let health = plane.backend_health().await;
    assert!(health.enabled);
    assert!(!health.available);
}

#[tokio::test]
async fn prompt_validation_happens_before_network() {
    let plane = plane_with(&["dig"], "http://127.0.0.1:9");
    assert!(matches!(
        plane.send_ai_message(""),
        Err(InferenceError::InvalidPrompt(_))
    ));
    assert!(matches!(
        plane.send_ai_message_on("ops", &"a".repeat(4_001)),
        Err(InferenceError::InvalidPrompt(_))
    ));
}

#[test]
fn tool_catalogue_reports_install_state() {
    let plane = plane_with(&["sh", "rift-definitely-not-installed"], "http://127.0.0.1:9");
    let tools = plane.list_tools();

    let names: Vec<&str> = tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(names, vec!["rift-definitely-not-installed", "sh"]);
    assert!(tools.iter().any(|tool| tool.name == "sh" && tool.installed));
    assert!(
        tools
            .iter()
            .any(|tool| tool.name == "rift-definitely-not-installed" && !tool.installed)
    );
}
