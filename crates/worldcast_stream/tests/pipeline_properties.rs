//! End-to-end pipeline behaviour against fake renderers and sinks.
//!
//! Covers the frame budget, one-frame-in-flight backpressure, the three
//! stop paths (budget, session end, sink failure), skipped ticks and
//! pacing under both simulated and wall-clock time.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{test_config, FakeRenderer, FakeSink};
use worldcast_core::{CameraPose, ChunkWindow, Clock, ManualClock, Vec3};
use worldcast_session::session_channel;
use worldcast_stream::{AbortReason, ControlError, Pipeline, PipelineOutcome, Recorder, RecorderStatus};

fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_budget_delivers_exactly_n_frames() {
    for budget in [0u64, 1, 5, 25] {
        let (renderer, renders) = FakeRenderer::new();
        let (sink, counters) = FakeSink::new();
        let (_feed, events) = session_channel();

        let frames = i64::try_from(budget).unwrap();
        let report = Pipeline::new(test_config(60, frames), renderer, sink.boxed())
            .with_clock(Arc::new(ManualClock::new()))
            .run(events);

        assert_eq!(report.outcome, PipelineOutcome::Completed { frames_delivered: budget });
        assert_eq!(renders.renders.load(Ordering::SeqCst), budget);
        assert_eq!(counters.payloads.lock().len() as u64, budget);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_blocked_sink_suppresses_next_tick() {
    let (renderer, renders) = FakeRenderer::new();
    let (sink, counters) = FakeSink::new();
    let sink = sink
        .blocking_first(3)
        .with_drain_delay(Duration::from_millis(2));
    let (_feed, events) = session_channel();

    let report = Pipeline::new(test_config(60, 4), renderer, sink.boxed())
        .with_clock(Arc::new(ManualClock::new()))
        .run(events);

    assert_eq!(report.outcome, PipelineOutcome::Completed { frames_delivered: 4 });
    assert_eq!(counters.blocked.load(Ordering::SeqCst), 3);
    assert_eq!(report.stats.blocked_writes, 3);
    // Blocked writes retry the same bytes: no extra renders.
    assert_eq!(renders.renders.load(Ordering::SeqCst), 4);
    assert_eq!(counters.violations.load(Ordering::SeqCst), 0);
}

#[test]
fn test_socket_payloads_are_length_prefixed() {
    let (renderer, _renders) = FakeRenderer::new();
    let (sink, counters) = FakeSink::new();
    let (_feed, events) = session_channel();

    let report = Pipeline::new(test_config(60, 6), renderer, sink.with_drain_delay(Duration::from_millis(1)).boxed())
        .with_clock(Arc::new(ManualClock::new()))
        .run(events);

    assert_eq!(report.stats.next_sequence, 6);
    let payloads = counters.payloads.lock();
    assert_eq!(payloads.len(), 6);
    for payload in payloads.iter() {
        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(&payload[..4]);
        assert_eq!(u32::from_le_bytes(prefix) as usize, payload.len() - 4);
    }
    assert_eq!(counters.violations.load(Ordering::SeqCst), 0);
}

#[test]
fn test_session_end_aborts_with_single_close() {
    let (renderer, _renders) = FakeRenderer::new();
    let (sink, counters) = FakeSink::new();
    let (feed, events) = session_channel();

    let pipeline = Pipeline::new(test_config(200, -1), renderer, sink.boxed());
    let runner = thread::spawn(move || pipeline.run(events));

    wait_until("three frames", || counters.accepted.load(Ordering::SeqCst) >= 3);
    assert!(feed.end("kicked: idle"));

    let report = runner.join().unwrap();
    match report.outcome {
        PipelineOutcome::Aborted {
            reason: AbortReason::SessionEnded(ref reason),
            frames_delivered,
        } => {
            assert_eq!(reason, "kicked: idle");
            assert!(frames_delivered >= 3);
        }
        ref other => panic!("unexpected outcome {other:?}"),
    }
    assert!(!report.outcome.is_defect());
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_dropped_session_counts_as_session_end() {
    let (renderer, _renders) = FakeRenderer::new();
    let (sink, counters) = FakeSink::new();
    let (feed, events) = session_channel();
    drop(feed);

    let report = Pipeline::new(test_config(60, -1), renderer, sink.boxed()).run(events);

    assert!(matches!(
        report.outcome,
        PipelineOutcome::Aborted {
            reason: AbortReason::SessionEnded(_),
            ..
        }
    ));
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_sink_failure_on_frame_k_halts_rendering() {
    let k = 3;
    let (renderer, renders) = FakeRenderer::new();
    let (sink, counters) = FakeSink::new();
    let (_feed, events) = session_channel();

    let report = Pipeline::new(test_config(60, -1), renderer, sink.failing_on(k).boxed())
        .with_clock(Arc::new(ManualClock::new()))
        .run(events);

    match &report.outcome {
        PipelineOutcome::Aborted {
            reason: AbortReason::SinkFailed(reason),
            frames_delivered,
        } => {
            assert_eq!(*frames_delivered, k - 1);
            assert!(reason.contains("injected failure"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(report.outcome.is_defect());
    assert_eq!(renders.renders.load(Ordering::SeqCst), k);
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_render_failures_skip_tick() {
    let (renderer, renders) = FakeRenderer::failing_on(vec![2, 4]);
    let (sink, _counters) = FakeSink::new();
    let (_feed, events) = session_channel();

    let report = Pipeline::new(test_config(60, 5), renderer, sink.boxed())
        .with_clock(Arc::new(ManualClock::new()))
        .run(events);

    assert_eq!(report.outcome, PipelineOutcome::Completed { frames_delivered: 5 });
    assert_eq!(report.stats.render_failures, 2);
    assert_eq!(report.stats.ticks, 7);
    assert_eq!(report.stats.next_sequence, 5);
    assert_eq!(renders.renders.load(Ordering::SeqCst), 5);
}

#[test]
fn test_wrong_sized_frames_skip_tick() {
    let (renderer, renders) = FakeRenderer::new();
    let (sink, counters) = FakeSink::new();
    let (_feed, events) = session_channel();
    let mut config = test_config(60, 2);
    config.width = common::WIDTH * 2;

    let pipeline = Pipeline::new(config, renderer, sink.boxed()).with_clock(Arc::new(ManualClock::new()));
    let lifecycle = pipeline.lifecycle();
    let runner = thread::spawn(move || pipeline.run(events));

    wait_until("a few renders", || renders.renders.load(Ordering::SeqCst) >= 3);
    lifecycle.request_stop();
    let report = runner.join().unwrap();

    assert_eq!(report.outcome, PipelineOutcome::Completed { frames_delivered: 0 });
    assert!(report.stats.serialize_failures >= 1);
    assert_eq!(report.stats.next_sequence, 0);
    assert_eq!(counters.writes.load(Ordering::SeqCst), 0);
}

#[test]
fn test_renderer_sees_published_pose() {
    let (renderer, counters) = FakeRenderer::new();
    let (sink, _sink_counters) = FakeSink::new();
    let (_feed, events) = session_channel();

    let pipeline = Pipeline::new(test_config(60, 1), renderer, sink.boxed()).with_clock(Arc::new(ManualClock::new()));
    let pose = CameraPose::new(Vec3::new(40.0, 70.0, -8.0), 1.25, -0.3);
    pipeline.mirror().publish(pose, ChunkWindow::around(pose.position, 2));
    pipeline.run(events);

    assert_eq!(counters.poses.lock().first().copied(), Some(pose));
}

#[test]
fn test_pacing_simulated_no_catch_up() {
    let clock = Arc::new(ManualClock::new());
    let (renderer, _renders) = FakeRenderer::new();
    let (sink, _counters) = FakeSink::new();
    let (_feed, events) = session_channel();

    let report = Pipeline::new(test_config(10, 11), renderer, sink.boxed())
        .with_clock(Arc::clone(&clock) as Arc<dyn Clock>)
        .run(events);

    assert_eq!(report.outcome, PipelineOutcome::Completed { frames_delivered: 11 });
    // Eleven frames, ten delays between them, none after the last.
    assert_eq!(clock.timers_armed(), 10);
    assert_eq!(clock.now(), Duration::from_secs(1));
    assert_eq!(report.pacing.delays, 10);
    // Simulated work takes no time, so the full target rate is achievable.
    assert!((report.effective_fps - 10.0).abs() < 1e-9);
}

#[test]
fn test_pacing_wall_clock_within_tolerance() {
    let (renderer, _renders) = FakeRenderer::new();
    let (sink, _counters) = FakeSink::new();
    let (_feed, events) = session_channel();

    let started = Instant::now();
    let report = Pipeline::new(test_config(10, 11), renderer, sink.boxed()).run(events);
    let elapsed = started.elapsed();

    assert_eq!(report.outcome, PipelineOutcome::Completed { frames_delivered: 11 });
    assert!(elapsed >= Duration::from_millis(1000), "too fast: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1400), "too slow: {elapsed:?}");
}

#[test]
fn test_stop_request_completes() {
    let (renderer, _renders) = FakeRenderer::new();
    let (sink, counters) = FakeSink::new();
    let (_feed, events) = session_channel();

    let pipeline = Pipeline::new(test_config(200, -1), renderer, sink.boxed());
    let lifecycle = pipeline.lifecycle();
    let runner = thread::spawn(move || pipeline.run(events));

    wait_until("two frames", || counters.accepted.load(Ordering::SeqCst) >= 2);
    assert!(lifecycle.request_stop());
    assert!(!lifecycle.session_ended("too late"));

    let report = runner.join().unwrap();
    assert!(matches!(report.outcome, PipelineOutcome::Completed { frames_delivered } if frames_delivered >= 2));
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_stop_while_blocked_stops_writing() {
    let (renderer, _renders) = FakeRenderer::new();
    let (sink, counters) = FakeSink::new();
    // Never drains: every write is refused and readiness is always queued.
    let sink = sink.blocking_first(u64::MAX);
    let (_feed, events) = session_channel();

    let pipeline = Pipeline::new(test_config(60, -1), renderer, sink.boxed());
    let lifecycle = pipeline.lifecycle();
    let runner = thread::spawn(move || pipeline.run(events));

    wait_until("blocked writes", || counters.blocked.load(Ordering::SeqCst) >= 5);
    assert!(lifecycle.request_stop());
    let writes_at_stop = counters.writes.load(Ordering::SeqCst);

    let report = runner.join().unwrap();
    assert_eq!(report.outcome, PipelineOutcome::Completed { frames_delivered: 0 });
    assert!(counters.writes.load(Ordering::SeqCst) <= writes_at_stop + 1);
    assert_eq!(counters.accepted.load(Ordering::SeqCst), 0);
}

#[test]
fn test_pipelines_run_side_by_side() {
    let runs: Vec<_> = (0..3u64)
        .map(|i| {
            let (renderer, _renders) = FakeRenderer::new();
            let (sink, _counters) = FakeSink::new();
            thread::spawn(move || {
                let (_feed, events) = session_channel();
                let frames = i64::try_from(i + 2).unwrap();
                Pipeline::new(test_config(60, frames), renderer, sink.boxed())
                    .with_clock(Arc::new(ManualClock::new()))
                    .run(events)
            })
        })
        .collect();

    for (i, run) in runs.into_iter().enumerate() {
        let report = run.join().unwrap();
        assert_eq!(report.outcome.frames_delivered(), i as u64 + 2);
    }
}

#[test]
fn test_recorder_allows_one_recording() {
    let recorder = Recorder::new();
    assert_eq!(recorder.status(), RecorderStatus::Idle);

    let (renderer, _renders) = FakeRenderer::new();
    let (sink, counters) = FakeSink::new();
    let (_feed, events) = session_channel();
    let handle = recorder
        .start(
            Pipeline::new(test_config(200, -1), renderer, sink.boxed()),
            events,
            Some("Notch"),
        )
        .unwrap();

    assert_eq!(
        recorder.status(),
        RecorderStatus::Recording {
            destination: "fake:0".into(),
            follow: Some("Notch".into()),
        }
    );

    let (renderer, _renders) = FakeRenderer::new();
    let (sink, second_counters) = FakeSink::new();
    let (_feed2, events2) = session_channel();
    let err = recorder
        .start(Pipeline::new(test_config(60, 1), renderer, sink.boxed()), events2, None)
        .err()
        .unwrap();
    assert!(matches!(err, ControlError::AlreadyRecording { .. }));
    assert_eq!(second_counters.writes.load(Ordering::SeqCst), 0);

    wait_until("a frame", || counters.accepted.load(Ordering::SeqCst) >= 1);
    assert!(recorder.stop());
    let report = handle.wait().unwrap();
    assert!(matches!(report.outcome, PipelineOutcome::Completed { .. }));
    assert_eq!(recorder.status(), RecorderStatus::Idle);
    assert!(!recorder.stop());
}
