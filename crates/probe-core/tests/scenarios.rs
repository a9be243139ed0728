//! End-to-end engine scenarios against a scripted adapter.
//!
//! Each test drives the real engine and the real session transport over
//! in-memory pipes; the test plays the adapter side, asserting on every
//! request it receives.

mod support;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use probe_core::{
    BreakpointState, Debugger, DebuggerError, DebuggerHandle, SessionState,
    PENDING_BREAKPOINT_MESSAGE,
};
use probe_dap::{AdapterDescriptor, LaunchAction};

use support::{fake_factory, FakeAdapter, RecordingConsole};

struct Fixture {
    console: Arc<RecordingConsole>,
    handle: DebuggerHandle,
    adapters: mpsc::UnboundedReceiver<FakeAdapter>,
    _shutdown: mpsc::UnboundedReceiver<i32>,
}

async fn wait_for_state(handle: &DebuggerHandle, expected: SessionState) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if handle.lock().await.state() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for state {expected}"));
}

async fn wait_until<F>(handle: &DebuggerHandle, what: &str, predicate: F)
where
    F: Fn(&Debugger) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if predicate(&*handle.lock().await) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}

/// Boot a launch-mode session up to the configuring state.
async fn start_launch_session(
    descriptor: AdapterDescriptor,
    caps: serde_json::Value,
) -> (Fixture, FakeAdapter) {
    let console = RecordingConsole::new();
    let (factory, mut adapters) = fake_factory();
    let debugger = Debugger::with_factory(descriptor, console.clone(), factory);
    let (handle, shutdown) = DebuggerHandle::new(debugger);

    let launch_task = tokio::spawn({
        let handle = handle.clone();
        async move { handle.launch().await }
    });
    let mut adapter = adapters.recv().await.expect("factory was not invoked");
    let init = adapter.expect_request("initialize").await;
    assert_eq!(init["arguments"]["adapterID"], "fake");
    adapter.respond(&init, caps).await;
    launch_task.await.unwrap().unwrap();

    let launch_req = adapter.expect_request("launch").await;
    adapter.respond(&launch_req, serde_json::json!({})).await;

    adapter.send_event("initialized", serde_json::json!({})).await;
    wait_for_state(&handle, SessionState::Configuring).await;

    (
        Fixture {
            console,
            handle,
            adapters,
            _shutdown: shutdown,
        },
        adapter,
    )
}

async fn respond_exception_and_config_done(adapter: &mut FakeAdapter) {
    let req = adapter.expect_request("setExceptionBreakpoints").await;
    adapter.respond(&req, serde_json::json!({})).await;
    let req = adapter.expect_request("configurationDone").await;
    adapter.respond(&req, serde_json::json!({})).await;
}

/// Answer the thread-list and stack-trace queries the engine issues while
/// handling a stop.
async fn respond_stop_queries(adapter: &mut FakeAdapter, threads: serde_json::Value) {
    let req = adapter.expect_request("threads").await;
    adapter
        .respond(&req, serde_json::json!({ "threads": threads }))
        .await;
    let req = adapter.expect_request("stackTrace").await;
    adapter
        .respond(
            &req,
            serde_json::json!({
                "stackFrames": [{
                    "id": 100,
                    "name": "main",
                    "line": 7,
                    "column": 1,
                    "source": { "name": "a.c", "path": "/a.c" }
                }]
            }),
        )
        .await;
}

// ---------------------------------------------------------------------------
// Scenario 1: launch + breakpoint + run + stop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn launch_breakpoint_run_stop() {
    let (fixture, mut adapter) = start_launch_session(
        AdapterDescriptor::generic("fake", "fake-dap"),
        serde_json::json!({ "supportsConfigurationDoneRequest": true }),
    )
    .await;
    let handle = fixture.handle.clone();

    // Input opened when configuring began.
    assert_eq!(fixture.console.last_gate_call().as_deref(), Some("start"));

    // A breakpoint created while configuring is pending.
    let added = handle
        .lock()
        .await
        .set_source_breakpoint("/a.c", 7, false)
        .await
        .unwrap();
    assert_eq!(added.index, 0);
    assert_eq!(added.message.as_deref(), Some(PENDING_BREAKPOINT_MESSAGE));

    // `run` flushes the deferred batch, exception filters, and
    // configurationDone, in that order.
    let run_task = tokio::spawn({
        let handle = handle.clone();
        async move { handle.lock().await.run().await }
    });
    let set_bps = adapter.expect_request("setBreakpoints").await;
    assert_eq!(set_bps["arguments"]["source"]["path"], "/a.c");
    assert_eq!(
        set_bps["arguments"]["breakpoints"],
        serde_json::json!([{ "line": 7 }])
    );
    adapter
        .respond(
            &set_bps,
            serde_json::json!({ "breakpoints": [{ "id": 1, "verified": true }] }),
        )
        .await;
    respond_exception_and_config_done(&mut adapter).await;
    run_task.await.unwrap().unwrap();

    {
        let dbg = handle.lock().await;
        assert_eq!(dbg.state(), SessionState::Running);
        let bp = dbg.get_breakpoint_by_index(0).unwrap();
        assert_eq!(bp.adapter_id(), Some(1));
        assert!(bp.is_verified());
    }
    // Input has been stopped since the transition into running.
    assert_eq!(fixture.console.last_gate_call().as_deref(), Some("stop"));

    // The stop event lands: stopped state, focus thread 1, input back.
    adapter
        .send_event(
            "stopped",
            serde_json::json!({
                "reason": "breakpoint",
                "description": "breakpoint",
                "threadId": 1,
                "allThreadsStopped": true
            }),
        )
        .await;
    respond_stop_queries(&mut adapter, serde_json::json!([{ "id": 1, "name": "main" }])).await;
    wait_for_state(&handle, SessionState::Stopped).await;

    let dbg = handle.lock().await;
    assert_eq!(dbg.threads().focus_thread_id(), Some(1));
    assert!(dbg.threads().focus_thread().unwrap().is_stopped());
    drop(dbg);
    assert_eq!(fixture.console.last_gate_call().as_deref(), Some("start"));
    assert!(fixture.console.has_line_containing("Stopped (breakpoint)"));
}

// ---------------------------------------------------------------------------
// Scenario 2: one-shot breakpoint disables itself on hit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn once_breakpoint_disables_on_hit() {
    let (fixture, mut adapter) = start_launch_session(
        AdapterDescriptor::generic("fake", "fake-dap"),
        serde_json::json!({
            "supportsConfigurationDoneRequest": true,
            "supportsBreakpointIdOnStop": true
        }),
    )
    .await;
    let handle = fixture.handle.clone();

    // Once is accepted because the adapter reports breakpoint ids on stop.
    let added = handle
        .lock()
        .await
        .set_source_breakpoint("/a.c", 7, true)
        .await
        .unwrap();
    assert_eq!(added.index, 0);

    let run_task = tokio::spawn({
        let handle = handle.clone();
        async move { handle.lock().await.run().await }
    });
    let set_bps = adapter.expect_request("setBreakpoints").await;
    assert_eq!(
        set_bps["arguments"]["breakpoints"],
        serde_json::json!([{ "line": 7 }])
    );
    adapter
        .respond(
            &set_bps,
            serde_json::json!({ "breakpoints": [{ "id": 0, "verified": true }] }),
        )
        .await;
    respond_exception_and_config_done(&mut adapter).await;
    run_task.await.unwrap().unwrap();

    // The stop is attributed to breakpoint id 0; before control returns,
    // the engine disables it and re-sends the now-empty batch.
    adapter
        .send_event(
            "stopped",
            serde_json::json!({
                "reason": "breakpoint",
                "threadId": 1,
                "breakpointId": 0,
                "allThreadsStopped": true
            }),
        )
        .await;
    let resend = adapter.expect_request("setBreakpoints").await;
    assert_eq!(resend["arguments"]["source"]["path"], "/a.c");
    assert_eq!(resend["arguments"]["breakpoints"], serde_json::json!([]));
    adapter
        .respond(&resend, serde_json::json!({ "breakpoints": [] }))
        .await;
    respond_stop_queries(&mut adapter, serde_json::json!([{ "id": 1, "name": "main" }])).await;
    wait_for_state(&handle, SessionState::Stopped).await;

    let dbg = handle.lock().await;
    assert_eq!(
        dbg.get_breakpoint_by_index(0).unwrap().state(),
        BreakpointState::Disabled
    );
}

// ---------------------------------------------------------------------------
// Scenario 3: failed toggle rolls back
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_toggle_rolls_back_state() {
    let (fixture, mut adapter) = start_launch_session(
        AdapterDescriptor::generic("fake", "fake-dap"),
        serde_json::json!({ "supportsConfigurationDoneRequest": true }),
    )
    .await;
    let handle = fixture.handle.clone();

    handle
        .lock()
        .await
        .set_source_breakpoint("/a.c", 7, false)
        .await
        .unwrap();

    let run_task = tokio::spawn({
        let handle = handle.clone();
        async move { handle.lock().await.run().await }
    });
    let set_bps = adapter.expect_request("setBreakpoints").await;
    adapter
        .respond(
            &set_bps,
            serde_json::json!({ "breakpoints": [{ "id": 1, "verified": true }] }),
        )
        .await;
    respond_exception_and_config_done(&mut adapter).await;
    run_task.await.unwrap().unwrap();

    // Toggling sends the shrunken batch; the adapter rejects it.
    let toggle_task = tokio::spawn({
        let handle = handle.clone();
        async move { handle.lock().await.toggle_breakpoint(0).await }
    });
    let resend = adapter.expect_request("setBreakpoints").await;
    assert_eq!(resend["arguments"]["breakpoints"], serde_json::json!([]));
    adapter.respond_error(&resend, "adapter fell over").await;

    let err = toggle_task.await.unwrap().unwrap_err();
    assert!(matches!(err, DebuggerError::Adapter(_)), "got {err:?}");

    // The local state is unchanged.
    let dbg = handle.lock().await;
    assert_eq!(
        dbg.get_breakpoint_by_index(0).unwrap().state(),
        BreakpointState::Enabled
    );
}

// ---------------------------------------------------------------------------
// Scenario 4: function breakpoint resolved to a source location
// ---------------------------------------------------------------------------

#[tokio::test]
async fn function_breakpoint_resolved_to_source() {
    let (fixture, mut adapter) = start_launch_session(
        AdapterDescriptor::generic("fake", "fake-dap"),
        serde_json::json!({
            "supportsConfigurationDoneRequest": true,
            "supportsFunctionBreakpoints": true
        }),
    )
    .await;
    let handle = fixture.handle.clone();

    // Run with no breakpoints; the adapter supports function breakpoints,
    // so the (empty) batch is part of the flush.
    let run_task = tokio::spawn({
        let handle = handle.clone();
        async move { handle.lock().await.run().await }
    });
    let set_fn = adapter.expect_request("setFunctionBreakpoints").await;
    assert_eq!(set_fn["arguments"]["breakpoints"], serde_json::json!([]));
    adapter
        .respond(&set_fn, serde_json::json!({ "breakpoints": [] }))
        .await;
    respond_exception_and_config_done(&mut adapter).await;
    run_task.await.unwrap().unwrap();

    // Setting the function breakpoint while running syncs immediately and
    // records the adapter's resolved location.
    let set_task = tokio::spawn({
        let handle = handle.clone();
        async move {
            handle
                .lock()
                .await
                .set_function_breakpoint("foo", false)
                .await
        }
    });
    let set_fn = adapter.expect_request("setFunctionBreakpoints").await;
    assert_eq!(
        set_fn["arguments"]["breakpoints"],
        serde_json::json!([{ "name": "foo" }])
    );
    adapter
        .respond(
            &set_fn,
            serde_json::json!({
                "breakpoints": [{
                    "id": 42,
                    "verified": true,
                    "source": { "path": "/x.c" },
                    "line": 9
                }]
            }),
        )
        .await;
    let added = set_task.await.unwrap().unwrap();
    assert_eq!(added.index, 0);

    let dbg = handle.lock().await;
    let bp = dbg.get_breakpoint_by_index(0).unwrap();
    assert_eq!(bp.adapter_id(), Some(42));
    assert!(bp.is_verified());
    assert_eq!(bp.location(), Some(("/x.c", 9)));
}

// ---------------------------------------------------------------------------
// Scenario 5: attach auto-stop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn attach_configures_and_pauses_declared_thread() {
    let console = RecordingConsole::new();
    let mut descriptor = AdapterDescriptor::generic("fake", "fake-dap");
    descriptor.action = LaunchAction::Attach;
    descriptor.async_stop_thread = Some(3);
    let (factory, mut adapters) = fake_factory();
    let debugger = Debugger::with_factory(descriptor, console.clone(), factory);
    let (handle, _shutdown) = DebuggerHandle::new(debugger);

    let launch_task = tokio::spawn({
        let handle = handle.clone();
        async move { handle.launch().await }
    });
    let mut adapter = adapters.recv().await.unwrap();
    let init = adapter.expect_request("initialize").await;
    adapter
        .respond(
            &init,
            serde_json::json!({ "supportsConfigurationDoneRequest": true }),
        )
        .await;
    // Attach is awaited inline, unlike launch.
    let attach = adapter.expect_request("attach").await;
    adapter.respond(&attach, serde_json::json!({})).await;
    launch_task.await.unwrap().unwrap();

    // initialized: the engine configures, caches threads, then pauses the
    // adapter-declared stop thread.
    adapter.send_event("initialized", serde_json::json!({})).await;
    let config_done = adapter.expect_request("configurationDone").await;
    adapter.respond(&config_done, serde_json::json!({})).await;
    let threads = adapter.expect_request("threads").await;
    adapter
        .respond(
            &threads,
            serde_json::json!({ "threads": [
                { "id": 1, "name": "main" },
                { "id": 3, "name": "worker" }
            ]}),
        )
        .await;
    let pause = adapter.expect_request("pause").await;
    assert_eq!(pause["arguments"]["threadId"], 3);
    adapter.respond(&pause, serde_json::json!({})).await;

    adapter
        .send_event(
            "stopped",
            serde_json::json!({
                "reason": "pause",
                "threadId": 3,
                "allThreadsStopped": true
            }),
        )
        .await;
    respond_stop_queries(
        &mut adapter,
        serde_json::json!([
            { "id": 1, "name": "main" },
            { "id": 3, "name": "worker" }
        ]),
    )
    .await;
    wait_for_state(&handle, SessionState::Stopped).await;

    let dbg = handle.lock().await;
    assert_eq!(dbg.threads().focus_thread_id(), Some(3));
    drop(dbg);
    assert_eq!(console.last_gate_call().as_deref(), Some("start"));
}

// ---------------------------------------------------------------------------
// Scenario 6: exited in launch mode auto-relaunches, breakpoints survive
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exited_in_launch_mode_relaunches_and_resends_breakpoints() {
    let (mut fixture, mut adapter) = start_launch_session(
        AdapterDescriptor::generic("fake", "fake-dap"),
        serde_json::json!({ "supportsConfigurationDoneRequest": true }),
    )
    .await;
    let handle = fixture.handle.clone();

    handle
        .lock()
        .await
        .set_source_breakpoint("/a.c", 7, false)
        .await
        .unwrap();

    let run_task = tokio::spawn({
        let handle = handle.clone();
        async move { handle.lock().await.run().await }
    });
    let set_bps = adapter.expect_request("setBreakpoints").await;
    adapter
        .respond(
            &set_bps,
            serde_json::json!({ "breakpoints": [{ "id": 1, "verified": true }] }),
        )
        .await;
    respond_exception_and_config_done(&mut adapter).await;
    run_task.await.unwrap().unwrap();

    // The program exits; the engine prints the exit line, reopens input,
    // and relaunches into a brand-new session.
    adapter
        .send_event("exited", serde_json::json!({ "exitCode": 0 }))
        .await;

    let mut second = fixture.adapters.recv().await.expect("no relaunch session");
    let init = second.expect_request("initialize").await;
    second
        .respond(
            &init,
            serde_json::json!({ "supportsConfigurationDoneRequest": true }),
        )
        .await;
    let launch_req = second.expect_request("launch").await;
    second.respond(&launch_req, serde_json::json!({})).await;
    second.send_event("initialized", serde_json::json!({})).await;
    wait_for_state(&handle, SessionState::Configuring).await;

    assert!(fixture.console.has_line_containing("Program exited with code 0."));

    // `run` on the new session re-sends the surviving breakpoint.
    let run_task = tokio::spawn({
        let handle = handle.clone();
        async move { handle.lock().await.run().await }
    });
    let set_bps = second.expect_request("setBreakpoints").await;
    assert_eq!(set_bps["arguments"]["source"]["path"], "/a.c");
    assert_eq!(
        set_bps["arguments"]["breakpoints"],
        serde_json::json!([{ "line": 7 }])
    );
    second
        .respond(
            &set_bps,
            serde_json::json!({ "breakpoints": [{ "id": 9, "verified": true }] }),
        )
        .await;
    respond_exception_and_config_done(&mut second).await;
    run_task.await.unwrap().unwrap();

    let dbg = handle.lock().await;
    assert_eq!(dbg.state(), SessionState::Running);
    // The new adapter id replaced the stale one.
    assert_eq!(dbg.get_breakpoint_by_index(0).unwrap().adapter_id(), Some(9));
}

// ---------------------------------------------------------------------------
// Event plumbing beyond the literal scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn output_events_forward_except_muted_categories() {
    let (fixture, mut adapter) = start_launch_session(
        AdapterDescriptor::generic("fake", "fake-dap"),
        serde_json::json!({ "supportsConfigurationDoneRequest": true }),
    )
    .await;

    adapter
        .send_event(
            "output",
            serde_json::json!({ "category": "stdout", "output": "hello\n" }),
        )
        .await;
    adapter
        .send_event(
            "output",
            serde_json::json!({ "category": "telemetry", "output": "secret\n" }),
        )
        .await;
    adapter
        .send_event(
            "output",
            serde_json::json!({ "category": "stdout", "output": "world\n" }),
        )
        .await;

    wait_until(&fixture.handle, "both stdout chunks", |_| {
        fixture
            .console
            .calls()
            .iter()
            .filter(|c| c.starts_with("output:"))
            .count()
            >= 2
    })
    .await;
    let outputs: Vec<String> = fixture
        .console
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("output:"))
        .collect();
    assert_eq!(outputs, vec!["output:hello\n", "output:world\n"]);
}

#[tokio::test]
async fn breakpoint_event_updates_verification() {
    let (fixture, mut adapter) = start_launch_session(
        AdapterDescriptor::generic("fake", "fake-dap"),
        serde_json::json!({ "supportsConfigurationDoneRequest": true }),
    )
    .await;
    let handle = fixture.handle.clone();

    handle
        .lock()
        .await
        .set_source_breakpoint("/a.c", 7, false)
        .await
        .unwrap();
    let run_task = tokio::spawn({
        let handle = handle.clone();
        async move { handle.lock().await.run().await }
    });
    let set_bps = adapter.expect_request("setBreakpoints").await;
    adapter
        .respond(
            &set_bps,
            serde_json::json!({ "breakpoints": [{ "id": 5, "verified": false, "message": "pending" }] }),
        )
        .await;
    respond_exception_and_config_done(&mut adapter).await;
    run_task.await.unwrap().unwrap();

    assert!(!handle
        .lock()
        .await
        .get_breakpoint_by_index(0)
        .unwrap()
        .is_verified());

    adapter
        .send_event(
            "breakpoint",
            serde_json::json!({
                "reason": "changed",
                "breakpoint": { "id": 5, "verified": true }
            }),
        )
        .await;
    wait_until(&handle, "breakpoint verification", |dbg| {
        dbg.get_breakpoint_by_index(0).map(|b| b.is_verified()).unwrap_or(false)
    })
    .await;
}

#[tokio::test]
async fn continued_event_marks_running_and_stops_input() {
    let (fixture, mut adapter) = start_launch_session(
        AdapterDescriptor::generic("fake", "fake-dap"),
        serde_json::json!({ "supportsConfigurationDoneRequest": true }),
    )
    .await;
    let handle = fixture.handle.clone();

    let run_task = tokio::spawn({
        let handle = handle.clone();
        async move { handle.lock().await.run().await }
    });
    respond_exception_and_config_done(&mut adapter).await;
    run_task.await.unwrap().unwrap();

    adapter
        .send_event(
            "stopped",
            serde_json::json!({ "reason": "pause", "threadId": 1, "allThreadsStopped": true }),
        )
        .await;
    respond_stop_queries(&mut adapter, serde_json::json!([{ "id": 1, "name": "main" }])).await;
    wait_for_state(&handle, SessionState::Stopped).await;

    // An adapter-initiated resume moves the state machine back to running
    // and closes the input gate.
    adapter
        .send_event(
            "continued",
            serde_json::json!({ "threadId": 1, "allThreadsContinued": true }),
        )
        .await;
    wait_for_state(&handle, SessionState::Running).await;
    assert_eq!(fixture.console.last_gate_call().as_deref(), Some("stop"));
}
