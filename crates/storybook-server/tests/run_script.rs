use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream;
use pretty_assertions::assert_eq;
use storybook_client::{ClientConfig, RunSession, StoryClient};
use storybook_core::{
    CallOutput, EVENT_STREAM_CONTENT_TYPE, Frame, FrameBody, LogPolicy, RunStatus, StoryRequest,
};
use storybook_server::{
    AppState, EngineError, EngineRun, RunOpts, ServerConfig, ToolEngine, router,
};

struct ScriptedEngine {
    frames: Vec<Result<Frame, EngineError>>,
    seen: Mutex<Vec<(String, RunOpts)>>,
}

impl ScriptedEngine {
    fn new(frames: Vec<Result<Frame, EngineError>>) -> Arc<Self> {
        Arc::new(Self {
            frames,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl ToolEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn start(&self, script: &str, opts: RunOpts) -> Result<EngineRun, EngineError> {
        self.seen
            .lock()
            .expect("lock")
            .push((script.to_string(), opts));
        Ok(EngineRun {
            frames: Box::pin(stream::iter(self.frames.clone())),
        })
    }
}

fn config() -> ServerConfig {
    ServerConfig {
        addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        script: "story-book.gpt".into(),
        engine_bin: "scripted".into(),
        engine_args: Vec::new(),
        stream_capacity: 2,
    }
}

async fn serve(engine: Arc<dyn ToolEngine>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = router(AppState::new(engine, &config()));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn client(base: &str) -> StoryClient {
    StoryClient::new(ClientConfig::new(base).read_timeout(Duration::from_secs(5))).expect("client")
}

#[tokio::test]
async fn story_run_streams_to_a_finished_state() {
    let engine = ScriptedEngine::new(vec![
        Ok(Frame::RunStart(FrameBody::default().with_tool("Story Writer"))),
        Ok(Frame::CallStart(FrameBody::default().with_tool("Draft Page 1"))),
        Ok(Frame::CallProgress(
            FrameBody::default().with_output(CallOutput::text("Once upon a time...")),
        )),
        Ok(Frame::run_finish("2026-01-01T00:00:00Z")),
    ]);
    let base = serve(engine.clone()).await;
    let client = client(&base);
    let mut session = client.session();

    let status = client
        .run(&mut session, &StoryRequest::new("A robot learns to paint", 3), &mut ())
        .await
        .expect("run");

    assert_eq!(status, RunStatus::Finished);
    let state = session.state();
    assert_eq!(state.progress_text, "Once upon a time...");
    assert_eq!(state.current_tool, "Draft Page 1");
    assert_eq!(
        state.event_log,
        vec![Frame::RunStart(FrameBody::default().with_tool("Story Writer"))]
    );

    let seen = engine.seen.lock().expect("lock");
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "story-book.gpt");
    assert!(seen[0].1.disable_cache);
    assert_eq!(
        seen[0].1.input,
        "--story A robot learns to paint --pages 3 --path public/stories"
    );
}

#[tokio::test]
async fn progress_is_retained_when_asked() {
    let engine = ScriptedEngine::new(vec![
        Ok(Frame::CallStart(FrameBody::default().with_tool("Draft Page 1"))),
        Ok(Frame::run_finish("t")),
    ]);
    let base = serve(engine).await;
    let client = StoryClient::new(
        ClientConfig::new(&base).log_policy(LogPolicy::RetainProgress),
    )
    .expect("client");
    let mut session = client.session();

    client
        .run(&mut session, &StoryRequest::new("robots", 1), &mut ())
        .await
        .expect("run");

    assert_eq!(session.state().event_log.len(), 1);
    assert_eq!(session.state().current_tool, "Draft Page 1");
}

#[tokio::test]
async fn engine_failure_ends_the_run_as_failed() {
    let engine = ScriptedEngine::new(vec![
        Ok(Frame::RunStart(FrameBody::default())),
        Err(EngineError::Exited { code: Some(1) }),
    ]);
    let base = serve(engine).await;
    let client = client(&base);
    let mut session = RunSession::default();

    let status = client
        .run(&mut session, &StoryRequest::new("robots", 2), &mut ())
        .await
        .expect("run");

    assert_eq!(status, RunStatus::Failed);
    assert_eq!(
        session.state().failure.as_deref(),
        Some("engine exited with status 1")
    );

    // The session accepts a new run once the previous one settled.
    let status = client
        .run(&mut session, &StoryRequest::new("robots", 2), &mut ())
        .await
        .expect("second run");
    assert_eq!(status, RunStatus::Failed);
}

#[tokio::test]
async fn engine_without_terminal_frame_still_finishes() {
    let engine = ScriptedEngine::new(vec![Ok(Frame::CallChat(
        FrameBody::default().with_input("robots"),
    ))]);
    let base = serve(engine).await;
    let client = client(&base);
    let mut session = client.session();

    let status = client
        .run(&mut session, &StoryRequest::new("robots", 2), &mut ())
        .await
        .expect("run");

    assert_eq!(status, RunStatus::Finished);
    assert_eq!(session.state().event_log.len(), 1);
}

#[tokio::test]
async fn response_is_an_uncached_event_stream() {
    let base = serve(ScriptedEngine::new(vec![Ok(Frame::run_finish("t"))])).await;
    let response = reqwest::Client::new()
        .post(format!("{base}/api/run-script"))
        .json(&StoryRequest::new("robots", 1))
        .send()
        .await
        .expect("send");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers.get("content-type").and_then(|v| v.to_str().ok()),
        Some(EVENT_STREAM_CONTENT_TYPE)
    );
    assert_eq!(
        headers.get("cache-control").and_then(|v| v.to_str().ok()),
        Some("no-cache")
    );
    let body = response.text().await.expect("body");
    assert_eq!(body, "event: {\"type\":\"runFinish\",\"end\":\"t\"}\n\n");
}

#[tokio::test]
async fn invalid_page_count_is_rejected_with_400() {
    let engine = ScriptedEngine::new(Vec::new());
    let base = serve(engine.clone()).await;
    let response = reqwest::Client::new()
        .post(format!("{base}/api/run-script"))
        .json(&serde_json::json!({"story": "robots", "pages": 11, "path": "out"}))
        .send()
        .await
        .expect("send");

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.expect("json");
    assert!(
        body["error"]
            .as_str()
            .is_some_and(|message| message.contains("pages must be between 1 and 10"))
    );
    assert!(engine.seen.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn unreadable_body_is_rejected_with_400_json() {
    let engine = ScriptedEngine::new(Vec::new());
    let base = serve(engine.clone()).await;
    let http = reqwest::Client::new();

    for body in [
        serde_json::json!({"story": "robots"}),
        serde_json::json!({"story": "robots", "pages": -1, "path": "out"}),
        serde_json::json!({"story": "robots", "pages": "3", "path": "out"}),
    ] {
        let response = http
            .post(format!("{base}/api/run-script"))
            .json(&body)
            .send()
            .await
            .expect("send");

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST, "{body}");
        let error: serde_json::Value = response.json().await.expect("json");
        assert!(error["error"].as_str().is_some_and(|m| !m.is_empty()), "{body}");
    }
    assert!(engine.seen.lock().expect("lock").is_empty());
}
