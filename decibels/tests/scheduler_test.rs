/// Integration tests for the polling scheduler
///
/// Each tick is driven by hand against scripted collaborators; the async
/// loop is exercised with short real-time polls.
mod common;

use std::time::Duration;

use common::{event_log, test_config, EventLog, FakeCapture, FakeSink};
use decibels_lib::audio::{AudioError, BufferId, PlaybackSink, SourceState};
use decibels_lib::config::MeterConfig;
use decibels_lib::meter::{Decibels, Loopback, MeterError, Scheduler, Tick};

type TestScheduler = Scheduler<FakeCapture, FakeSink, Vec<Decibels>>;

fn scheduler_with(config: &MeterConfig, log: &EventLog) -> TestScheduler {
    let loopback = Loopback::start(FakeCapture::new(log), FakeSink::new(log), config).unwrap();
    Scheduler::new(loopback, Vec::new(), config).unwrap()
}

fn scheduler(log: &EventLog) -> TestScheduler {
    scheduler_with(&test_config(), log)
}

fn capture(s: &mut TestScheduler) -> &mut FakeCapture {
    s.loopback_mut().capture_mut()
}

fn sink(s: &mut TestScheduler) -> &mut FakeSink {
    s.loopback_mut().playback_mut()
}

#[test]
fn test_idle_until_a_buffer_finishes() {
    let log = event_log();
    let mut s = scheduler(&log);
    capture(&mut s).push(&[100; 500]);

    for _ in 0..5 {
        assert_eq!(s.tick().unwrap(), Tick::Idle);
    }

    assert_eq!(capture(&mut s).reads, 0);
    assert_eq!(capture(&mut s).buffered(), 500);
    assert!(s.output().is_empty());
    assert_eq!(s.stats().idle_polls, 5);
    assert_eq!(s.estimator().rms_smooth(), 0.0);
}

#[test]
fn test_no_frames_means_no_cycle() {
    let log = event_log();
    let mut s = scheduler(&log);
    sink(&mut s).finish(1);

    assert_eq!(s.tick().unwrap(), Tick::EmptyCapture);

    assert_eq!(capture(&mut s).reads, 0);
    assert_eq!(sink(&mut s).dequeues, 0);
    assert_eq!(sink(&mut s).completed_count(), 1);
    assert!(s.output().is_empty());
    assert_eq!(s.estimator().rms_smooth(), 0.0);
    assert_eq!(s.stats().empty_captures, 1);
}

#[test]
fn test_negative_frame_count_treated_as_not_ready() {
    let log = event_log();
    let mut s = scheduler(&log);
    sink(&mut s).finish(1);
    capture(&mut s).push(&[1; 10]);
    capture(&mut s).reported = Some(-1);

    assert_eq!(s.tick().unwrap(), Tick::EmptyCapture);
    assert_eq!(capture(&mut s).reads, 0);
}

#[test]
fn test_same_block_is_measured_and_played() {
    let log = event_log();
    let mut s = scheduler(&log);
    let first = s.loopback().pool().ids()[0];
    sink(&mut s).finish(1);
    capture(&mut s).push(&[32767; 2500]);

    let tick = s.tick().unwrap();

    let level = match tick {
        Tick::Cycled {
            frames: 2500,
            level,
            restarted: false,
        } => level,
        other => panic!("Unexpected tick {:?}", other),
    };
    assert!((level.value() - (-4.437)).abs() < 0.01, "got {}", level);
    assert_eq!(s.output(), &vec![level]);
    assert!((s.estimator().rms_smooth() - 19660.2).abs() < 1e-6);
    assert_eq!(sink(&mut s).contents(first).unwrap(), &[32767; 2500][..]);
    assert_eq!(s.stats().frames_played, 2500);
}

#[test]
fn test_partial_block_plays_only_captured_frames() {
    let log = event_log();
    let mut s = scheduler(&log);
    let first = s.loopback().pool().ids()[0];
    sink(&mut s).finish(1);
    capture(&mut s).push(&[-200; 700]);

    assert!(matches!(
        s.tick().unwrap(),
        Tick::Cycled { frames: 700, .. }
    ));
    assert_eq!(sink(&mut s).contents(first).unwrap().len(), 700);
    assert_eq!(s.loopback().pool().filled_len(first), Some(700));
}

#[test]
fn test_surplus_frames_wait_for_next_cycle() {
    let log = event_log();
    let mut s = scheduler(&log);
    sink(&mut s).finish(2);
    capture(&mut s).push(&[5; 3000]);

    assert!(matches!(
        s.tick().unwrap(),
        Tick::Cycled { frames: 2500, .. }
    ));
    assert_eq!(capture(&mut s).buffered(), 500);

    assert!(matches!(
        s.tick().unwrap(),
        Tick::Cycled { frames: 500, .. }
    ));
    assert_eq!(capture(&mut s).buffered(), 0);
    assert_eq!(s.output().len(), 2);
}

#[test]
fn test_stalled_source_restarted_once() {
    let log = event_log();
    let mut s = scheduler(&log);
    let ids = s.loopback().pool().ids();
    assert_eq!(sink(&mut s).play_calls, 1);

    sink(&mut s).underrun();
    assert_eq!(sink(&mut s).source_state(), SourceState::Stopped);
    capture(&mut s).push(&[10; 400]);

    assert!(matches!(
        s.tick().unwrap(),
        Tick::Cycled {
            restarted: true,
            ..
        }
    ));
    assert_eq!(sink(&mut s).play_calls, 2);
    assert_eq!(sink(&mut s).source_state(), SourceState::Playing);
    assert_eq!(sink(&mut s).dequeues, 1);
    assert_eq!(sink(&mut s).queued_ids(), vec![ids[1], ids[0]]);
    assert_eq!(s.stats().playback_restarts, 1);

    sink(&mut s).finish(1);
    capture(&mut s).push(&[10; 400]);
    assert!(matches!(
        s.tick().unwrap(),
        Tick::Cycled {
            restarted: false,
            ..
        }
    ));
    assert_eq!(sink(&mut s).play_calls, 2);
}

#[test]
fn test_underflow_counted_once_per_idle_run() {
    let config = MeterConfig {
        stall_warn_polls: 3,
        ..test_config()
    };
    let log = event_log();
    let mut s = scheduler_with(&config, &log);

    for _ in 0..7 {
        s.tick().unwrap();
    }
    assert_eq!(s.stats().underflows, 1);

    sink(&mut s).finish(1);
    capture(&mut s).push(&[1; 10]);
    s.tick().unwrap();

    for _ in 0..3 {
        s.tick().unwrap();
    }
    assert_eq!(s.stats().underflows, 2);
    assert_eq!(s.stats().cycles, 1);
}

#[test]
fn test_invalid_smoothing_rejected() {
    let log = event_log();
    let config = test_config();
    let loopback = Loopback::start(FakeCapture::new(&log), FakeSink::new(&log), &config).unwrap();
    let bad = MeterConfig {
        smoothing: 1.0,
        ..config
    };

    let result = Scheduler::new(loopback, Vec::<Decibels>::new(), &bad);

    assert!(matches!(result, Err(MeterError::InvalidSmoothing(_))));
    assert!(log.borrow().contains(&"playback.close".to_string()));
}

#[tokio::test]
async fn test_run_stops_before_first_tick() {
    let log = event_log();
    let mut s = scheduler(&log);

    let stats = s.run(std::future::ready(())).await.unwrap();

    assert_eq!(stats.ticks, 0);
    assert!(s.loopback().is_torn_down());
    assert!(log.borrow().ends_with(&[
        "capture.stop".to_string(),
        "capture.close".to_string(),
        "playback.stop".to_string(),
        "playback.delete".to_string(),
        "playback.close".to_string(),
    ]));
}

#[tokio::test]
async fn test_run_polls_until_stopped() {
    let log = event_log();
    let mut s = scheduler(&log);

    let stats = s
        .run(tokio::time::sleep(Duration::from_millis(30)))
        .await
        .unwrap();

    assert!(stats.ticks > 0);
    assert_eq!(stats.idle_polls, stats.ticks);
    assert_eq!(&stats, s.stats());
    assert!(s.loopback().is_torn_down());
}

#[test]
fn test_failed_refill_retries_same_block_before_emitting() {
    let log = event_log();
    let mut s = scheduler(&log);
    let first = s.loopback().pool().ids()[0];
    sink(&mut s).finish(1);
    sink(&mut s).fail_fills = 1;
    capture(&mut s).push(&[30000; 2500]);
    capture(&mut s).push(&[10; 2500]);

    let err = s.tick().unwrap_err();

    assert!(err.is_recoverable());
    assert!(s.output().is_empty());
    assert_eq!(s.estimator().rms_smooth(), 0.0);
    assert_eq!(capture(&mut s).buffered(), 2500);

    let level = match s.tick().unwrap() {
        Tick::Cycled {
            frames: 2500,
            level,
            ..
        } => level,
        other => panic!("Unexpected tick {:?}", other),
    };

    assert_eq!(sink(&mut s).contents(first).unwrap(), &[30000; 2500][..]);
    assert_eq!(s.output(), &vec![level]);
    assert!((s.estimator().rms_smooth() - 18000.0).abs() < 1e-6);
    assert_eq!(capture(&mut s).buffered(), 2500);
    assert_eq!(sink(&mut s).dequeues, 1);
}

#[tokio::test]
async fn test_run_survives_recoverable_error() {
    let log = event_log();
    let mut s = scheduler(&log);
    sink(&mut s).finish(1);
    sink(&mut s).fail_fills = 1;
    capture(&mut s).push(&[9; 5000]);

    let stats = s
        .run(tokio::time::sleep(Duration::from_millis(40)))
        .await
        .unwrap();

    assert_eq!(stats.recovered_errors, 1);
    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.ticks, stats.idle_polls + stats.cycles + stats.recovered_errors);
    assert_eq!(s.output().len(), 1);
    assert_eq!(capture(&mut s).buffered(), 2500);
}

#[tokio::test]
async fn test_run_ends_on_fatal_error() {
    let log = event_log();
    let mut s = scheduler(&log);
    sink(&mut s).finish(1);
    sink(&mut s).rogue_dequeue = Some(BufferId(42));
    capture(&mut s).push(&[9; 100]);

    let result = s.run(std::future::pending::<()>()).await;

    assert!(matches!(
        result,
        Err(MeterError::Audio(AudioError::UnknownBuffer(BufferId(42))))
    ));
    assert!(s.loopback().is_torn_down());
}
