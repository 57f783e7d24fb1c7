mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use taskvalve::{
    Event, EventKind, Policy, RuntimeError, Scheduler, SchedulerConfig, Subscribe, Task, TaskOp,
    TaskState,
};

use common::{Probe, ids, settle};

/// Request-driven config whose self-scheduled re-poll stays out of the way.
fn manual(max_activations: usize) -> SchedulerConfig {
    SchedulerConfig {
        max_activations,
        interval: Duration::from_secs(3600),
        ..SchedulerConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn fifo_cap_then_raise() {
    let sched = Scheduler::<Probe>::new(manual(2)).unwrap();
    let (a, b, c) = (Probe::new("A"), Probe::new("B"), Probe::new("C"));
    sched.add([a.clone(), b.clone(), c.clone()]);

    sched.manual_poll();
    settle().await;
    assert_eq!(a.state(), TaskState::Running);
    assert_eq!(b.state(), TaskState::Running);
    assert_eq!(c.state(), TaskState::Suspended);
    assert_eq!(c.resumes(), 0);

    sched.set_max_activations(3);
    sched.manual_poll();
    settle().await;
    assert_eq!(c.resumes(), 1);
    assert_eq!((a.resumes(), b.resumes()), (1, 1));
    assert_eq!(ids(&sched.running_tasks()), vec!["A", "B", "C"]);
}

#[tokio::test(start_paused = true)]
async fn over_capacity_tasks_get_exactly_one_suspend() {
    let sched = Scheduler::<Probe>::new(manual(3)).unwrap();
    let tasks: Vec<_> = ["t1", "t2", "t3", "t4", "t5", "t6", "t7"]
        .into_iter()
        .map(|id| Probe::with_state(id, TaskState::Running))
        .collect();
    sched.add(tasks.iter().cloned());

    for _ in 0..3 {
        sched.manual_poll();
        settle().await;
    }

    let running: Vec<_> = tasks.iter().filter(|t| t.state() == TaskState::Running).collect();
    assert_eq!(running.len(), 3);
    for t in &tasks[3..] {
        assert_eq!(t.suspends(), 1, "task {}", t.id());
    }
}

#[tokio::test(start_paused = true)]
async fn re_add_replaces_and_cancels_once() {
    let sched = Scheduler::<Probe>::new(manual(8)).unwrap();
    let x = Probe::with_state("X", TaskState::Running);
    let y = Probe::new("X");

    sched.add([x.clone()]);
    sched.suspend(&["X"]);
    sched.add([y.clone()]);
    settle().await;

    assert_eq!(x.cancels(), 1);
    assert!(sched.suspended_tasks().is_empty());
    let running = sched.running_tasks();
    assert_eq!(running.len(), 1);
    assert!(Arc::ptr_eq(&running[0], &y));
    assert_eq!(sched.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn prioritize_reorders_running_list() {
    let sched = Scheduler::<Probe>::new(manual(8)).unwrap();
    sched.add(["A", "B", "C"].map(Probe::new));
    sched.prioritize(&["C"]);
    assert_eq!(ids(&sched.running_tasks()), vec!["C", "A", "B"]);
}

#[tokio::test(start_paused = true)]
async fn lifo_front_inserts_win_admission() {
    let mut cfg = manual(1);
    cfg.policy = Policy::Lifo;
    let sched = Scheduler::<Probe>::new(cfg).unwrap();
    let old = Probe::new("old");
    let new = Probe::new("new");
    sched.add([old.clone()]);
    sched.add([new.clone()]);

    sched.manual_poll();
    settle().await;
    assert_eq!(new.resumes(), 1);
    assert_eq!(old.resumes(), 0);
}

#[tokio::test(start_paused = true)]
async fn partitions_stay_disjoint() {
    let sched = Scheduler::<Probe>::new(manual(2)).unwrap();
    sched.add(["a", "b", "c", "d"].map(Probe::new));
    sched.suspend(&["a", "c"]);
    sched.resume(&["c"]);
    sched.add([Probe::new("a")]);
    sched.suspend(&["b", "b"]);
    sched.prioritize(&["d", "c"]);
    sched.cancel(&["d"]);

    let running = ids(&sched.running_tasks());
    let suspended = ids(&sched.suspended_tasks());
    for id in &running {
        assert!(!suspended.contains(id), "{id} in both partitions");
    }
    assert_eq!(running, vec!["c", "a"]);
    assert_eq!(suspended, vec!["b"]);
}

#[tokio::test(start_paused = true)]
async fn request_driven_loop_detects_stall_and_holds() {
    let cfg = SchedulerConfig {
        max_activations: 4,
        timeout: Duration::from_secs(1),
        duration_of_suspension: Duration::from_secs(5),
        interval: Duration::from_millis(100),
        ..SchedulerConfig::default()
    };
    let sched = Scheduler::<Probe>::new(cfg).unwrap();
    let stuck = Probe::with_state("stuck", TaskState::Running);
    stuck.set_progress(0.3);
    sched.add([stuck.clone()]);
    sched.manual_poll();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(stuck.suspends(), 1);
    assert_eq!(stuck.resumes(), 0);

    // Still held well inside the suspension window.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(stuck.suspends(), 1);
    assert_eq!(stuck.resumes(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(stuck.resumes(), 1);
    assert_eq!(stuck.suspends(), 1);
}

#[tokio::test(start_paused = true)]
async fn advancing_task_survives_many_timeouts() {
    let cfg = SchedulerConfig {
        timeout: Duration::from_millis(500),
        interval: Duration::from_millis(100),
        ..SchedulerConfig::default()
    };
    let sched = Scheduler::<Probe>::new(cfg).unwrap();
    let busy = Probe::with_state("busy", TaskState::Running);
    sched.add([busy.clone()]);
    sched.manual_poll();

    for step in 1..=40 {
        busy.set_progress(step as f64 / 40.0);
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    assert_eq!(busy.suspends(), 0);
}

#[tokio::test(start_paused = true)]
async fn auto_poll_toggles_the_clock() {
    let cfg = SchedulerConfig {
        max_activations: 1,
        interval: Duration::from_millis(100),
        auto_poll: true,
        ..SchedulerConfig::default()
    };
    let sched = Scheduler::<Probe>::new(cfg).unwrap();
    let (a, b) = (Probe::new("a"), Probe::new("b"));
    sched.add([a.clone(), b.clone()]);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(sched.auto_poll());
    assert_eq!(a.state(), TaskState::Running);
    assert_eq!(b.state(), TaskState::Suspended);

    sched.set_auto_poll(false);
    a.set_state(TaskState::Completed);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(sched.contains(&"a"));
    assert_eq!(b.resumes(), 0);

    sched.manual_poll();
    settle().await;
    assert!(!sched.contains(&"a"));
    assert_eq!(b.resumes(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_all_reaches_a_large_backlog() {
    let sched = Scheduler::<Probe>::new(manual(8)).unwrap();
    let tasks: Vec<_> = (0..1500)
        .map(|n| {
            let id: &'static str = Box::leak(format!("job-{n}").into_boxed_str());
            Probe::with_state(id, TaskState::Running)
        })
        .collect();
    sched.add(tasks.iter().cloned());

    sched.cancel_all();
    settle().await;

    assert!(sched.is_empty());
    let missed = tasks.iter().filter(|t| t.cancels() != 1).count();
    assert_eq!(missed, 0);
}

#[tokio::test(start_paused = true)]
async fn operator_resume_skips_the_suspension_window() {
    let cfg = SchedulerConfig {
        max_activations: 1,
        timeout: Duration::from_secs(10),
        duration_of_suspension: Duration::from_secs(30),
        interval: Duration::from_secs(3600),
        ..SchedulerConfig::default()
    };
    let sched = Scheduler::<Probe>::new(cfg).unwrap();
    let t = Probe::new("t");
    t.set_progress(0.4);
    sched.add([t.clone()]);
    sched.manual_poll();
    settle().await;

    tokio::time::advance(Duration::from_secs(11)).await;
    sched.manual_poll();
    settle().await;
    assert_eq!((t.resumes(), t.suspends()), (1, 1));

    sched.suspend(&["t"]);
    sched.resume(&["t"]);
    sched.manual_poll();
    settle().await;
    assert_eq!(t.resumes(), 2);
}

#[tokio::test(start_paused = true)]
async fn burst_of_manual_polls_is_coalesced() {
    let sched = Scheduler::<Probe>::new(manual(8)).unwrap();
    let mut rx = sched.subscribe();
    sched.add([Probe::new("a")]);

    for _ in 0..10 {
        sched.manual_poll();
    }
    settle().await;

    let mut passes = 0;
    while let Ok(ev) = rx.try_recv() {
        if ev.kind == EventKind::PollCompleted {
            passes += 1;
        }
    }
    assert_eq!(passes, 1);
}

#[tokio::test(start_paused = true)]
async fn events_describe_each_decision() {
    let sched = Scheduler::<Probe>::new(manual(1)).unwrap();
    let mut rx = sched.subscribe();
    sched.add([Probe::new("a"), Probe::with_state("b", TaskState::Running)]);
    sched.manual_poll();
    settle().await;

    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }
    let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::TaskAdded,
            EventKind::TaskAdded,
            EventKind::TaskResumed,
            EventKind::TaskSuspended,
            EventKind::PollCompleted,
        ]
    );
    assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));
    assert_eq!(events[2].task.as_deref(), Some("\"a\""));
    assert_eq!(events[2].op, Some(TaskOp::Resume));
    assert_eq!(events[3].reason.as_deref(), Some("over_capacity"));

    let summary = events[4].poll.unwrap();
    assert_eq!((summary.running, summary.resumed, summary.suspended), (1, 1, 1));
}

struct Recorder(Mutex<Vec<EventKind>>);

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, event: &Event) {
        self.0.lock().push(event.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test(start_paused = true)]
async fn builder_wires_subscribers() {
    let rec = Arc::new(Recorder(Mutex::new(Vec::new())));
    let subs: Vec<Arc<dyn Subscribe>> = vec![rec.clone()];
    let sched = Scheduler::<Probe>::builder(manual(8))
        .with_subscribers(subs)
        .build()
        .unwrap();

    let t = Probe::new("t");
    sched.add([t.clone()]);
    sched.cancel(&["t"]);
    settle().await;

    assert_eq!(t.cancels(), 1);
    assert_eq!(
        *rec.0.lock(),
        vec![EventKind::TaskAdded, EventKind::TaskCanceled]
    );
}

#[tokio::test(start_paused = true)]
async fn dropping_the_scheduler_stops_polling() {
    let cfg = SchedulerConfig {
        interval: Duration::from_millis(100),
        auto_poll: true,
        ..SchedulerConfig::default()
    };
    let sched = Scheduler::<Probe>::new(cfg).unwrap();
    let t = Probe::new("t");
    sched.add([t.clone()]);
    drop(sched);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(t.resumes(), 0);
    assert_eq!(Arc::strong_count(&t), 1);
}

#[test]
fn construction_requires_a_runtime() {
    assert!(matches!(
        Scheduler::<Probe>::new(SchedulerConfig::default()),
        Err(RuntimeError::NoRuntime)
    ));
}
