use std::sync::mpsc;
use std::time::{Duration, Instant};

use flowfill::{
    Color, FillError, FillEvent, FillOutcome, FillRequest, FillSession, FillSessionState,
    FillSettings, NoOpReason, PixelBuffer, RasterImage,
};

const RED: Color = Color::rgb(255, 0, 0);
const BLUE: Color = Color::rgb(0, 0, 255);

fn white(w: u32, h: u32) -> RasterImage {
    RasterImage::new(w, h, Color::WHITE)
}

/// 4x4 with a black 1-pixel border around a white 2x2 interior.
fn bordered() -> RasterImage {
    let mut buf = PixelBuffer::from_image(&white(4, 4)).unwrap();
    for i in 0..4 {
        buf.set(i, 0, Color::BLACK);
        buf.set(i, 3, Color::BLACK);
        buf.set(0, i, Color::BLACK);
        buf.set(3, i, Color::BLACK);
    }
    buf.into_image().unwrap()
}

/// Drain an animated fill, returning its snapshots and completion.
fn collect(rx: mpsc::Receiver<FillEvent>) -> (Vec<RasterImage>, FillOutcome) {
    let mut snaps = Vec::new();
    for event in rx.iter() {
        match event {
            FillEvent::Progress(img) => snaps.push(img),
            FillEvent::Completed(outcome) => return (snaps, outcome),
        }
    }
    panic!("stream ended without a completion");
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

// ============================================================================
// Synchronous fills
// ============================================================================

#[test]
fn uniform_image_fills_completely() {
    let session = FillSession::new(white(4, 4), FillSettings::default());
    let report = session.fill(FillRequest::new(0, 0, RED, 0));
    assert_eq!(report.outcome, FillOutcome::Filled { pixels: 16 });
    assert_eq!(report.image.count_color(RED), 16);
    assert_eq!(session.history_len(), 2);
    assert!(session.can_undo());
    assert_eq!(session.current_image(), report.image);
}

#[test]
fn dark_border_holds_at_full_tolerance() {
    let session = FillSession::new(bordered(), FillSettings::default());
    let report = session.fill(FillRequest::new(1, 1, BLUE, 100));
    assert_eq!(report.outcome, FillOutcome::Filled { pixels: 4 });
    assert_eq!(report.image.count_color(BLUE), 4);
    assert_eq!(report.image.count_color(Color::BLACK), 12);
}

#[test]
fn already_filled_origin_is_a_no_op() {
    let image = RasterImage::new(4, 4, RED);
    let session = FillSession::new(image.clone(), FillSettings::default());
    let report = session.fill(FillRequest::new(2, 2, RED, 0));
    assert_eq!(report.outcome, FillOutcome::Unchanged(NoOpReason::AlreadyFilled));
    assert_eq!(report.image, image);
    assert_eq!(session.history_len(), 1);
    assert!(!session.can_undo());
}

#[test]
fn rejected_requests_leave_state_alone() {
    let session = FillSession::new(white(3, 3), FillSettings::default());
    let report = session.fill(FillRequest::new(-1, 0, RED, 0));
    assert!(matches!(
        report.outcome,
        FillOutcome::Rejected(FillError::OutOfBounds { x: -1, y: 0, .. })
    ));
    assert_eq!(session.history_len(), 1);
    assert_eq!(session.state(), FillSessionState::Idle);
}

#[test]
fn undo_redo_and_reset_walk_committed_fills() {
    let session = FillSession::new(white(4, 1), FillSettings::default());
    let first = session.fill(FillRequest::new(0, 0, RED, 0)).image;
    let second = session.fill(FillRequest::new(0, 0, BLUE, 0)).image;
    assert_eq!(session.history_len(), 3);

    assert_eq!(session.undo(), Some(first.clone()));
    assert_eq!(session.current_image(), first);
    assert_eq!(session.redo(), Some(second));

    assert_eq!(session.reset(), Some(white(4, 1)));
    assert!(!session.can_undo());
    assert!(session.can_redo());
}

#[test]
fn new_fill_after_undo_discards_redo() {
    let session = FillSession::new(white(2, 1), FillSettings::default());
    for color in [RED, BLUE, Color::rgb(0, 255, 0)] {
        session.fill(FillRequest::new(0, 0, color, 0));
    }
    session.undo();
    session.fill(FillRequest::new(0, 0, Color::rgb(9, 9, 200), 0));
    assert!(!session.can_redo());
    assert_eq!(session.history_len(), 4);
    assert_eq!(
        session.history_descriptions().last().map(String::as_str),
        Some("Fill #0909c8ff at (0, 0)")
    );
}

#[test]
fn history_is_capped_by_settings() {
    let settings = FillSettings {
        max_history: 3,
        ..Default::default()
    };
    let session = FillSession::new(white(1, 1), settings);
    for n in 0..5u8 {
        session.fill(FillRequest::new(0, 0, Color::rgb(n, 100, 100), 0));
    }
    assert_eq!(session.history_len(), 3);
    assert!(session.undo().is_some());
    assert!(session.undo().is_some());
    assert!(session.undo().is_none());
}

#[test]
fn reset_after_eviction_keeps_initial_undoable() {
    let settings = FillSettings {
        max_history: 3,
        ..Default::default()
    };
    let original = white(1, 1);
    let session = FillSession::new(original.clone(), settings);
    for n in 0..4u8 {
        session.fill(FillRequest::new(0, 0, Color::rgb(20 * n, 100, 100), 0));
    }
    assert_eq!(session.history_len(), 3);

    assert_eq!(session.reset(), Some(original.clone()));
    assert_eq!(session.current_image(), original);
    assert_eq!(session.history_descriptions()[0], "Open");

    session.fill(FillRequest::new(0, 0, BLUE, 0));
    assert_eq!(session.undo(), Some(original.clone()));
    assert_eq!(session.current_image(), original);
    assert!(!session.can_undo());
}

// ============================================================================
// Animated fills
// ============================================================================

#[test]
fn animated_fill_grows_and_commits() {
    let settings = FillSettings {
        batch_limit: 3,
        ..Default::default()
    };
    let session = FillSession::new(white(4, 4), settings);
    let (snaps, outcome) = collect(session.fill_animated_channel(FillRequest::new(0, 0, RED, 0)));

    assert_eq!(outcome, FillOutcome::Filled { pixels: 16 });
    let counts: Vec<usize> = snaps.iter().map(|s| s.count_color(RED)).collect();
    assert!(counts.len() > 1);
    assert!(counts.windows(2).all(|w| w[0] <= w[1]), "{:?}", counts);
    assert_eq!(counts.last(), Some(&16));

    assert!(wait_until(Duration::from_secs(5), || session.state() == FillSessionState::Idle));
    assert_eq!(session.history_len(), 2);
    assert_eq!(session.current_image().count_color(RED), 16);
}

#[test]
fn animated_and_sync_agree_on_the_bordered_image() {
    let session = FillSession::new(bordered(), FillSettings::default());
    let (snaps, outcome) =
        collect(session.fill_animated_channel(FillRequest::new(1, 1, BLUE, 100)));
    assert_eq!(outcome, FillOutcome::Filled { pixels: 4 });
    let last = snaps.last().unwrap();
    assert_eq!(last.count_color(BLUE), 4);
    assert_eq!(last.count_color(Color::BLACK), 12);
}

#[test]
fn animated_no_op_emits_one_snapshot() {
    let image = RasterImage::new(4, 4, RED);
    let session = FillSession::new(image.clone(), FillSettings::default());
    let (snaps, outcome) = collect(session.fill_animated_channel(FillRequest::new(2, 2, RED, 0)));
    assert_eq!(outcome, FillOutcome::Unchanged(NoOpReason::AlreadyFilled));
    assert_eq!(snaps, vec![image]);
    assert!(wait_until(Duration::from_secs(5), || session.state() == FillSessionState::Idle));
    assert_eq!(session.history_len(), 1);
}

#[test]
fn second_request_is_rejected_while_running() {
    let settings = FillSettings {
        batch_limit: 1,
        ..Default::default()
    };
    let original = white(4, 4);
    let session = FillSession::new(original.clone(), settings);

    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    let (seen_tx, seen_rx) = mpsc::channel::<()>();
    let (done_tx, done_rx) = mpsc::channel::<FillOutcome>();
    session.fill_animated(
        FillRequest::new(0, 0, RED, 0),
        move |_| {
            let _ = seen_tx.send(());
            let _ = gate_rx.recv();
        },
        move |outcome| {
            let _ = done_tx.send(outcome);
        },
    );

    seen_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(session.state(), FillSessionState::Running);
    assert!(session.undo().is_none());

    let report = session.fill(FillRequest::new(3, 3, BLUE, 0));
    assert_eq!(report.outcome, FillOutcome::Rejected(FillError::AlreadyRunning));
    assert_eq!(report.image, original);

    let (snaps, outcome) = collect(session.fill_animated_channel(FillRequest::new(3, 3, BLUE, 0)));
    assert_eq!(outcome, FillOutcome::Rejected(FillError::AlreadyRunning));
    assert_eq!(snaps, vec![original]);

    drop(gate_tx);
    let outcome = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(outcome, FillOutcome::Filled { pixels: 16 });
    assert!(wait_until(Duration::from_secs(5), || session.state() == FillSessionState::Idle));
    assert_eq!(session.history_len(), 2);
}

#[test]
fn timeout_commits_partial_result_once() {
    let settings = FillSettings {
        batch_limit: 1,
        fill_timeout_ms: 50,
        ..Default::default()
    };
    let session = FillSession::new(white(4, 4), settings);

    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    let (done_tx, done_rx) = mpsc::channel::<FillOutcome>();
    session.fill_animated(
        FillRequest::new(0, 0, RED, 0),
        move |_| {
            let _ = gate_rx.recv();
        },
        move |outcome| {
            let _ = done_tx.send(outcome);
        },
    );

    // The consumer is stuck on the first snapshot; the watchdog frees the session
    assert!(wait_until(Duration::from_secs(5), || session.state() == FillSessionState::Idle));
    assert_eq!(session.history_len(), 2);
    let partial = session.current_image().count_color(RED);
    assert!(partial >= 1 && partial < 16, "{}", partial);

    drop(gate_tx);
    assert_eq!(
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        FillOutcome::TimedOut
    );
    // the late worker result neither completes again nor commits
    assert!(done_rx.recv_timeout(Duration::from_millis(300)).is_err());
    assert_eq!(session.history_len(), 2);
    assert_eq!(session.current_image().count_color(RED), partial);

    let report = session.fill(FillRequest::new(3, 3, BLUE, 0));
    assert!(report.outcome.changed_image());
}
