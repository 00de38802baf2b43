//! Built-in debugger cases.
//!
//! Extents scale off the configured window like everything else: a "long"
//! self-execution is `config.long_extent`, a "short" one a quarter of that.

use crate::config::Config;
use crate::model::{
    EventBinding, EventKind, FrameKind, FrameSpec, RunState, Scenario, ScenarioError, TrackSpec,
};

pub const BUILTIN_NAMES: &[&str] = &[
    "simple_one_thread",
    "two_threads",
    "breakpoint_in_another_thread",
    "suspend_thread_mode",
    "coroutine",
    "round_trip",
];

/// Look up a built-in case sized for the default window.
pub fn builtin(name: &str) -> Result<Scenario, ScenarioError> {
    builtin_for(name, &Config::default())
}

pub fn builtin_for(name: &str, config: &Config) -> Result<Scenario, ScenarioError> {
    let sizes = Sizes::from(config);
    let scenario = match name {
        "simple_one_thread" => simple_one_thread(sizes),
        "two_threads" => two_threads(sizes),
        "breakpoint_in_another_thread" => breakpoint_in_another_thread(sizes),
        "suspend_thread_mode" => suspend_thread_mode(sizes),
        "coroutine" => coroutine(sizes),
        "round_trip" => round_trip(),
        other => return Err(ScenarioError::UnknownBuiltin(other.to_string())),
    };
    Ok(scenario)
}

#[derive(Debug, Clone, Copy)]
struct Sizes {
    long: f64,
    short: f64,
}

impl From<&Config> for Sizes {
    fn from(config: &Config) -> Self {
        Self {
            long: config.long_extent,
            short: config.short_extent,
        }
    }
}

fn on(kind: EventKind, next: RunState) -> EventBinding {
    EventBinding::new(kind, next)
}

fn stepping_over(target: &str) -> RunState {
    RunState::SteppingOver(target.to_string())
}

/// `count` repetitions of a short self-execution followed by a short call.
fn calls(f: &mut FrameSpec, label: &str, count: usize, short: f64) {
    for _ in 0..count {
        f.span(short);
        f.frame(label, |f| {
            f.span(short);
        });
    }
}

fn simple_one_thread(s: Sizes) -> Scenario {
    let main = FrameSpec::build("main", |f| {
        f.span(s.long);
        f.frame("foo", |f| {
            f.span(s.long);
            f.span_with(s.short, on(EventKind::Breakpoint, stepping_over("boo")));
            f.frame("boo", |f| {
                f.span(s.long);
            });
            f.span_with(s.short, on(EventKind::SteppingEnd, stepping_over("bar")));
            f.frame("bar", |f| {
                f.span_with(s.long, on(EventKind::Breakpoint, RunState::Running));
            });
        });
        f.span(s.short);
    });
    Scenario::new("simple_one_thread", vec![TrackSpec::new(main)])
}

fn stepping_thread(s: Sizes, callee_extent: f64) -> FrameSpec {
    FrameSpec::build("bar", |f| {
        f.span(s.long);
        f.span_with(s.short, on(EventKind::Breakpoint, stepping_over("foo")));
        f.frame("foo", |f| {
            f.span(callee_extent);
        });
        f.span_with(s.short, on(EventKind::SteppingEnd, RunState::Running));
        calls(f, "boo", 11, s.short);
    })
}

fn two_threads(s: Sizes) -> Scenario {
    let run = FrameSpec::build("run", |f| {
        f.span(s.long);
        calls(f, "func", 101, s.short);
    });
    Scenario::new(
        "two_threads",
        vec![
            TrackSpec::new(stepping_thread(s, s.long)),
            TrackSpec::new(run),
        ],
    )
}

fn breakpoint_in_another_thread(s: Sizes) -> Scenario {
    let run = FrameSpec::build("run", |f| {
        f.span(s.long);
        f.frame("another", |f| {
            f.span(s.long);
            f.span_with(s.long, on(EventKind::SkippedBreakpoint, stepping_over("some")));
        });
        calls(f, "func", 101, s.short);
    });
    Scenario::new(
        "breakpoint_in_another_thread",
        vec![
            TrackSpec::new(stepping_thread(s, s.long * 3.0)),
            TrackSpec::new(run),
        ],
    )
}

/// Three threads, two permanent breakpoints: the debugger's suspend-thread
/// policy where a stopped thread waits for the user.
fn suspend_thread_mode(s: Sizes) -> Scenario {
    let bar = FrameSpec::build("bar", |f| {
        f.span(s.long);
        f.span_with(
            s.short,
            on(EventKind::PermanentThreadBreakpoint, stepping_over("foo")),
        );
        f.frame("foo", |f| {
            f.span(s.long * 3.0);
        });
        f.span(s.long);
        f.span_with(s.short, on(EventKind::SteppingEnd, RunState::Running));
        f.span(s.long);
        calls(f, "boo", 11, s.short);
    });
    let run = FrameSpec::build("run", |f| {
        f.span(s.long);
        f.frame("another", |f| {
            f.span(s.long);
            f.span_with(
                s.long,
                on(EventKind::PermanentThreadBreakpoint, RunState::Running),
            );
        });
        calls(f, "func", 101, s.short);
    });
    let run2 = FrameSpec::build("run2", |f| {
        f.span(s.long);
        calls(f, "func", 101, s.short);
    });
    Scenario::new(
        "suspend_thread_mode",
        vec![
            TrackSpec::new(bar),
            TrackSpec::new(run),
            TrackSpec::new(run2),
        ],
    )
}

fn boundary(coroutine: &str, open: bool, close: bool) -> FrameKind {
    FrameKind::CoroutineBoundary {
        coroutine: coroutine.to_string(),
        open,
        close,
    }
}

/// Two dispatcher threads interleaving coroutine segments. Breakpoints
/// evaluate `getCoroutineId` in the stopped thread before resuming it.
fn coroutine(s: Sizes) -> Scenario {
    let get_coroutine_id = FrameSpec::build("getCoroutineId", |f| {
        f.span(s.short);
    })
    .with_kind(FrameKind::Evaluation);
    let evaluate = |kind: EventKind| {
        on(kind, RunState::ResumeThread).with_injection(get_coroutine_id.clone())
    };

    let first = FrameSpec::build("dispatch", |f| {
        f.span(s.short);
        f.frame_of_kind("launch 1", boundary("Coroutine#1", true, false), |f| {
            f.span(s.short);
            f.frame("fff", |f| {
                f.span(s.short);
            });
        });
        f.span(s.short);
        f.frame_of_kind("launch 3", boundary("Coroutine#3", true, false), |f| {
            f.span(s.short);
            f.frame("hhh", |f| {
                f.span(s.short);
            });
        });
        f.span(s.long * 1.5);
        f.frame_of_kind("", boundary("Coroutine#1", false, false), |f| {
            f.frame("fff", |f| {
                f.span(s.short);
            });
            f.span(s.short);
            f.frame("boo", |f| {
                f.span_with(s.short, evaluate(EventKind::Breakpoint));
                f.span_with(
                    s.short,
                    on(
                        EventKind::SetFilter("Coroutine#1".to_string()),
                        stepping_over("func()"),
                    ),
                );
                f.frame("func", |f| {
                    f.span(s.short);
                });
            });
        });
        for i in 50..=53 {
            f.span(s.short);
            f.frame(format!("launch {i}"), |f| {
                f.span(s.long);
            });
        }
        f.frame("launch 56", |f| {
            f.span(s.long);
            f.frame("boo", |f| {
                f.span_with(s.short, evaluate(EventKind::ThreadBreakpoint));
            });
        });
    });

    let second = FrameSpec::build("dispatch", |f| {
        f.span(s.short * 1.5);
        f.frame_of_kind("launch 2", boundary("Coroutine#2", true, false), |f| {
            f.span(s.long);
            f.frame("ggg", |f| {
                f.span(s.short);
            });
        });
        f.span(s.short);
        f.frame_of_kind("", boundary("Coroutine#1", false, false), |f| {
            f.frame("fff", |f| {
                f.span(s.long);
            });
        });
        f.span(s.long);
        f.frame_of_kind("", boundary("Coroutine#3", false, true), |f| {
            f.frame("hhh", |f| {
                f.span(s.long);
            });
            f.span(s.long);
        });
        f.span(s.long);
        f.frame_of_kind("", boundary("Coroutine#4", true, false), |f| {
            f.span(s.long);
            f.frame("someAnotherFunc", |f| {
                f.span(s.long);
                f.span_with(s.short, evaluate(EventKind::Breakpoint));
                f.span(s.long);
            });
        });
        f.span(s.long);
        f.frame_of_kind("", boundary("Coroutine#4", false, true), |f| {
            f.frame("someAnotherFunc", |f| {
                f.span(s.long);
            });
            f.span(s.long);
        });
    });

    Scenario::new(
        "coroutine",
        vec![TrackSpec::new(first), TrackSpec::new(second)],
    )
}

/// Fixed-size two-track case: one breakpoint that steps over `boo` while a
/// second thread runs a hundred short calls.
pub fn round_trip() -> Scenario {
    let a = FrameSpec::build("main", |f| {
        f.span(40.0);
        f.frame("foo", |f| {
            f.span_with(10.0, on(EventKind::Breakpoint, stepping_over("boo")));
            f.frame("boo", |f| {
                f.span(40.0);
            });
        });
    });
    let b = FrameSpec::build("run", |f| {
        f.span(40.0);
        for _ in 0..100 {
            f.frame("func", |f| {
                f.span(10.0);
            });
        }
    });
    Scenario::new(
        "round_trip",
        vec![TrackSpec::new(a).named("A"), TrackSpec::new(b).named("B")],
    )
}
