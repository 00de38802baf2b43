//! End-to-end checks of the scheduler on small hand-built scenarios and on
//! the built-in cases. Every test runs on tokio's paused clock, so pauses of
//! any length (including the day-long permanent timer) complete instantly.

use std::time::Duration;

use stepreel_core::model::{
    CallTree, EventBinding, EventKind, FrameKind, FrameSpec, Node, RunState, Scenario, TrackId,
    TrackSpec,
};
use stepreel_core::scenarios::builtin;
use stepreel_core::{CommandSink, Config, ResumeSignal, RunReport, Timeline};

const EPS: f64 = 1e-9;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < EPS
}

/// Labels and padding take no room, so positions are plain sums of extents.
fn bare_config() -> Config {
    Config {
        char_width: 0.0,
        text_shift: 0.0,
        marker_width: 0.0,
        speed: 100.0,
        ..Config::default()
    }
}

fn on(kind: EventKind, next: RunState) -> EventBinding {
    EventBinding::new(kind, next)
}

async fn run(scenario: &Scenario, config: Config, resume: Option<ResumeSignal>) -> RunReport {
    let timeline = Timeline::prepare(scenario, config).expect("scenario should prepare");
    let (sink, _rx) = CommandSink::channel();
    timeline.run(&sink, resume).await.expect("run should succeed")
}

fn check_tree(tree: &CallTree) {
    for id in tree.frames_preorder(tree.root()) {
        let frame = tree.frame(id).expect("pre-order yields frames");
        assert_eq!(frame.root, tree.root(), "root cache of {}", frame.label);
        match frame.parent {
            Some(parent) => {
                let parent = tree.frame(parent).expect("parent is a frame");
                assert_eq!(frame.depth, parent.depth + 1, "depth of {}", frame.label);
            }
            None => assert_eq!(frame.depth, 0),
        }
    }
}

fn child_widths(tree: &CallTree, frame: &stepreel_core::model::FrameNode) -> f64 {
    frame
        .children
        .iter()
        .map(|child| match tree.node(*child) {
            Some(Node::Span(span)) => span.extent,
            Some(Node::Frame(sub)) => sub.width,
            None => 0.0,
        })
        .sum()
}

#[test]
fn layout_width_is_additive() {
    let config = Config::default();
    for name in ["simple_one_thread", "coroutine", "two_threads"] {
        let scenario = builtin(name).expect("built-in exists");
        let timeline = Timeline::prepare(&scenario, config.clone()).expect("prepare");
        for track in timeline.tracks() {
            let tree = &track.tree;
            for id in tree.frames_preorder(tree.root()) {
                let frame = tree.frame(id).expect("frame");
                let expected = config.label_width(&frame.label)
                    + config.text_shift
                    + child_widths(tree, frame);
                assert!(
                    (frame.width - expected).abs() < 1e-6,
                    "{name}: width of {} is {}, expected {expected}",
                    frame.label,
                    frame.width
                );
            }
        }
    }
}

#[test]
fn depths_follow_tree_distance() {
    let scenario = builtin("coroutine").expect("built-in exists");
    let timeline = Timeline::prepare(&scenario, Config::default()).expect("prepare");
    for track in timeline.tracks() {
        check_tree(&track.tree);
        let mut again = track.tree.clone();
        let root = again.root();
        again.assign_depths(root, 0);
        assert_eq!(again, track.tree, "depth assignment is idempotent");
    }
}

#[tokio::test(start_paused = true)]
async fn single_track_events_are_consumed_in_order() {
    let scenario = builtin("simple_one_thread").expect("built-in exists");
    let config = Config::default();
    let timeline = Timeline::prepare(&scenario, config.clone()).expect("prepare");
    let queued: Vec<f64> = timeline.queues()[0].iter().map(|e| e.position).collect();
    let end = *queued.last().expect("end marker");
    assert!(queued.iter().all(|p| *p <= end));

    let report = run(&scenario, config, None).await;
    let consumed: Vec<f64> = report.consumed.iter().map(|c| c.position).collect();
    assert_eq!(consumed, queued);
    assert_eq!(
        report.consumed.last().map(|c| &c.kind),
        Some(&EventKind::EndOfAnimation)
    );
}

#[tokio::test(start_paused = true)]
async fn injection_widens_and_reshifts_exactly_once() {
    let injected = FrameSpec::build("eval", |f| {
        f.span(20.0);
    })
    .with_kind(FrameKind::Evaluation);
    let scenario = Scenario::new(
        "inject",
        vec![TrackSpec::new(FrameSpec::build("main", |f| {
            f.span_with(20.0, on(EventKind::Breakpoint, RunState::Running));
            f.span(20.0);
            f.span_with(
                20.0,
                on(EventKind::Breakpoint, RunState::Running).with_injection(injected),
            );
            f.span(20.0);
            f.span_with(20.0, on(EventKind::Breakpoint, RunState::Running));
        }))],
    );

    let timeline = Timeline::prepare(&scenario, bare_config()).expect("prepare");
    let before: Vec<f64> = timeline.queues()[0].iter().map(|e| e.position).collect();
    assert_eq!(before, vec![10.0, 50.0, 90.0, 100.0]);

    let report = run(&scenario, bare_config(), None).await;
    let after: Vec<(EventKind, f64)> = report
        .consumed
        .iter()
        .map(|c| (c.kind.clone(), c.position))
        .collect();
    assert_eq!(
        after,
        vec![
            (EventKind::Breakpoint, 10.0),
            (EventKind::Breakpoint, 50.0),
            (EventKind::EvaluationEnd, 70.0),
            (EventKind::Breakpoint, 110.0),
            (EventKind::EndOfAnimation, 120.0),
        ]
    );
    assert!(close(report.tracks[0].width(), 120.0));
    check_tree(&report.tracks[0].tree);
}

#[tokio::test(start_paused = true)]
async fn exclusive_run_freezes_other_tracks() {
    let scenario = Scenario::new(
        "exclusive",
        vec![
            TrackSpec::new(FrameSpec::build("a", |f| {
                f.span_with(20.0, on(EventKind::Breakpoint, RunState::ResumeThread));
                f.span_with(20.0, on(EventKind::ThreadBreakpoint, RunState::Evaluation));
                f.span_with(20.0, on(EventKind::SteppingEnd, RunState::Running));
                f.span(20.0);
            })),
            TrackSpec::new(FrameSpec::build("b", |f| {
                f.span(500.0);
            })),
        ],
    );
    let report = run(&scenario, bare_config(), None).await;
    let b = TrackId(1);

    // While the first track holds the exclusive grant, the second one
    // stays where the first breakpoint left it.
    for consumed in &report.consumed[..3] {
        assert_eq!(consumed.track, TrackId(0));
        assert_eq!(consumed.position_of(b), Some(10.0), "{:?}", consumed.kind);
    }
    let released = report
        .consumed
        .iter()
        .find(|c| c.track == TrackId(0) && c.kind == EventKind::EndOfAnimation)
        .expect("first track ends");
    assert_eq!(released.position_of(b), Some(40.0));
}

#[tokio::test(start_paused = true)]
async fn round_trip_scenario_terminates_with_one_pause() {
    let scenario = builtin("round_trip").expect("built-in exists");
    let report = run(&scenario, Config::default(), None).await;

    assert_eq!(report.consumed.len(), 3, "one breakpoint and two end markers");
    let captions = report.caption_texts();
    assert_eq!(
        captions,
        vec!["Running", "Paused", "Stepping Over boo", "Done"]
    );
    assert_eq!(captions.iter().filter(|c| **c == "Paused").count(), 1);
}

fn permanent_case(kind: EventKind) -> Scenario {
    Scenario::new(
        "permanent",
        vec![
            TrackSpec::new(FrameSpec::build("a", |f| {
                f.span_with(20.0, on(kind, RunState::Running));
                f.span(20.0);
            })),
            TrackSpec::new(FrameSpec::build("b", |f| {
                f.span(300.0);
            })),
        ],
    )
}

#[tokio::test(start_paused = true)]
async fn permanent_suspend_all_freezes_every_track() {
    let report = run(
        &permanent_case(EventKind::PermanentBreakpoint),
        bare_config(),
        None,
    )
    .await;
    let a_end = report
        .consumed
        .iter()
        .find(|c| c.track == TrackId(0) && c.kind == EventKind::EndOfAnimation)
        .expect("first track ends");
    // Both tracks only ever moved together.
    assert_eq!(a_end.position_of(TrackId(1)), Some(40.0));
    // The permanent timer ran out before anything else happened.
    let day = Config::default().permanent_pause_ms;
    assert!(a_end.at_ms >= day);
}

#[tokio::test(start_paused = true)]
async fn permanent_thread_pause_lets_siblings_move() {
    let report = run(
        &permanent_case(EventKind::PermanentThreadBreakpoint),
        bare_config(),
        None,
    )
    .await;
    let kinds: Vec<(TrackId, EventKind)> = report
        .consumed
        .iter()
        .map(|c| (c.track, c.kind.clone()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (TrackId(0), EventKind::PermanentThreadBreakpoint),
            (TrackId(1), EventKind::EndOfAnimation),
            (TrackId(0), EventKind::EndOfAnimation),
        ]
    );
    // The second track ran to its end while the first was still held.
    assert_eq!(report.consumed[1].position_of(TrackId(0)), Some(10.0));
    assert_eq!(report.consumed[1].position_of(TrackId(1)), Some(300.0));
}

#[tokio::test(start_paused = true)]
async fn resume_signal_ends_a_permanent_pause() {
    let signal = ResumeSignal::new();
    let remote = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        remote.resume();
    });

    let report = run(
        &permanent_case(EventKind::PermanentBreakpoint),
        bare_config(),
        Some(signal),
    )
    .await;
    let a_end = report
        .consumed
        .iter()
        .find(|c| c.track == TrackId(0) && c.kind == EventKind::EndOfAnimation)
        .expect("first track ends");
    // 10 px to the breakpoint, released at 5 s, 30 px to the end.
    assert!((a_end.at_ms - 5300.0).abs() < 5.0, "ended at {}", a_end.at_ms);
}

#[tokio::test(start_paused = true)]
async fn independent_tracks_pause_concurrently() {
    let track = || {
        TrackSpec::new(FrameSpec::build("t", |f| {
            f.span_with(20.0, on(EventKind::Breakpoint, RunState::Running));
            f.span(20.0);
        }))
    };
    let synchronous = Scenario::new("sync", vec![track(), track()]);
    let independent = synchronous.clone().independent();

    let sync_report = run(&synchronous, bare_config(), None).await;
    let free_report = run(&independent, bare_config(), None).await;

    assert!((sync_report.elapsed_ms - 2400.0).abs() < 5.0);
    assert!((free_report.elapsed_ms - 1400.0).abs() < 5.0);
    assert!(free_report.captions.iter().all(|c| c.track.is_some()));
    assert!(sync_report.captions.iter().all(|c| c.track.is_none()));
    assert!(close(
        free_report.final_position(TrackId(0)).expect("track 0"),
        40.0
    ));
}

#[tokio::test(start_paused = true)]
async fn every_builtin_runs_to_completion() {
    for name in stepreel_core::scenarios::BUILTIN_NAMES {
        let scenario = builtin(name).expect("built-in exists");
        let report = run(&scenario, Config::default(), None).await;
        assert!(!report.consumed.is_empty(), "{name} consumed nothing");
        assert_eq!(report.caption_texts().last(), Some(&"Done"), "{name}");
        for track in &report.tracks {
            check_tree(&track.tree);
        }
    }
}
