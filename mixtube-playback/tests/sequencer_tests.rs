//! Sequencer tests with scripted slots
//!
//! Covers skip, auto-advance, retry on load failure, pause/resume gating,
//! stop detection and the stop / check-next-entry controls.

mod common;

use common::*;
use mixtube_playback::{
    NextEntryProducer, PlaybackEvent, Sequencer, SequencerConfig, SequencerState, Slot,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn sequencer(recorder: &Arc<SlotRecorder>, next: NextEntryProducer<usize>) -> Sequencer<usize> {
    Sequencer::new(SequencerConfig {
        next_entry_producer: next,
        slot_producer: recorder.producer(),
        event_capacity: 256,
    })
}

fn failing() -> SlotBehavior {
    SlotBehavior {
        fail_load: true,
        ..SlotBehavior::default()
    }
}

fn auto_ending() -> SlotBehavior {
    SlotBehavior {
        auto_end_after: Some(Duration::from_millis(20)),
        ..SlotBehavior::default()
    }
}

// ============================================================================
// Play / pause
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_play_does_not_pick_an_entry() {
    let asked = Arc::new(Mutex::new(Vec::new()));
    let log = asked.clone();
    let next: NextEntryProducer<usize> = Arc::new(move |entry: Option<&usize>| {
        log.lock().unwrap().push(entry.copied());
        None
    });
    let recorder = SlotRecorder::new();
    let seq = sequencer(&recorder, next);

    seq.play();
    settle().await;

    assert_eq!(seq.state(), SequencerState::Playing);
    assert!(asked.lock().unwrap().is_empty());
    assert!(recorder.slots().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_state_changes_on_play_and_pause() {
    let recorder = SlotRecorder::new();
    let seq = sequencer(&recorder, no_next_entry());
    let mut events = seq.subscribe();

    seq.pause();
    seq.play();
    seq.play();
    seq.pause();

    assert_eq!(
        next_event(&mut events).await,
        PlaybackEvent::StateChanged {
            previous: SequencerState::Pristine,
            current: SequencerState::Playing,
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        PlaybackEvent::StateChanged {
            previous: SequencerState::Playing,
            current: SequencerState::Paused,
        }
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_slots_created_before_play_are_suspended() {
    let recorder = SlotRecorder::new();
    let seq = sequencer(&recorder, no_next_entry());
    let mut events = seq.subscribe();

    seq.skip(0).unwrap();
    let slot = recorder.slot(0);
    assert_eq!(slot.calls().first(), Some(&"suspend"));

    seq.play();
    wait_playing(&mut events, 0).await;
    assert_eq!(slot.count("proceed"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_skip_while_paused_starts_gated() {
    let recorder = SlotRecorder::new();
    let seq = sequencer(&recorder, no_next_entry());
    let mut events = seq.subscribe();

    seq.play();
    seq.pause();
    seq.skip(0).unwrap();
    wait_playing(&mut events, 0).await;

    let slot = recorder.slot(0);
    assert_eq!(slot.count("proceed"), 0);
    let calls = slot.calls();
    let suspended = calls.iter().position(|c| *c == "suspend").unwrap();
    let started = calls.iter().position(|c| *c == "start").unwrap();
    assert!(suspended < started);

    seq.play();
    assert_eq!(slot.count("proceed"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resume_after_skip_while_paused() {
    let recorder = SlotRecorder::new();
    let seq = sequencer(&recorder, no_next_entry());
    let mut events = seq.subscribe();

    seq.play();
    seq.pause();
    seq.skip(0).unwrap();
    wait_playing(&mut events, 0).await;
    seq.skip(1).unwrap();
    wait_playing(&mut events, 1).await;
    settle().await;

    seq.play();

    let slots = recorder.slots();
    assert_eq!(slots[0].count("proceed"), 0);
    assert_eq!(slots[0].count("end"), 1);
    assert_eq!(slots[1].count("proceed"), 1);
}

// ============================================================================
// Skip
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_manual_skip_sequence() {
    let asked = Arc::new(Mutex::new(Vec::new()));
    let log = asked.clone();
    let entries = entries_producer(5);
    let next: NextEntryProducer<usize> = Arc::new(move |entry: Option<&usize>| {
        log.lock().unwrap().push(entry.copied());
        entries(entry)
    });
    let recorder = SlotRecorder::new();
    let seq = sequencer(&recorder, next);
    let mut events = seq.subscribe();

    seq.skip(0).unwrap();
    seq.play();
    wait_playing(&mut events, 0).await;
    seq.skip(3).unwrap();
    wait_playing(&mut events, 3).await;

    // Entry 0 playing preloads 1; skipping to 3 plays it and preloads 4
    assert_eq!(recorder.entries(), vec![0, 1, 3, 4]);
    assert_eq!(*asked.lock().unwrap(), vec![Some(0), Some(3)]);

    let preloaded = recorder.slot(1);
    assert_eq!(preloaded.count("end"), 1);
    assert_eq!(preloaded.count("start"), 0);
    assert_eq!(seq.playing_entry(), Some(3));
    assert_eq!(seq.preloading_entry(), Some(4));
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_skips_keep_the_last_entry() {
    let recorder = SlotRecorder::new();
    let seq = sequencer(&recorder, entries_producer(5));
    let mut events = seq.subscribe();

    seq.play();
    for entry in 0..5 {
        seq.skip(entry).unwrap();
        settle().await;
    }
    wait_playing(&mut events, 4).await;
    settle().await;

    let slots = recorder.slots();
    let (last, earlier) = slots.split_last().unwrap();
    for slot in earlier {
        assert_eq!(slot.count("end"), 1, "slot for {} not ended", slot.entry());
    }
    assert_eq!(*last.entry(), 4);
    assert_eq!(last.count("end"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_skip_reports_loading() {
    let recorder = SlotRecorder::new();
    let seq = sequencer(&recorder, no_next_entry());
    let mut events = seq.subscribe();

    seq.play();
    seq.skip(2).unwrap();
    let seen = wait_playing(&mut events, 2).await;

    let loading: Vec<bool> = seen
        .iter()
        .filter_map(|e| match e {
            PlaybackEvent::LoadingChanged { entry: 2, loading } => Some(*loading),
            _ => None,
        })
        .collect();
    assert_eq!(loading, vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn test_skip_supersedes_slow_preload() {
    let recorder = SlotRecorder::new();
    recorder.set_behavior(
        1,
        SlotBehavior {
            load_delay: Some(Duration::from_secs(1)),
            ..SlotBehavior::default()
        },
    );
    let seq = sequencer(&recorder, entries_producer(5));
    let mut events = seq.subscribe();

    seq.play();
    seq.skip(0).unwrap();
    wait_playing(&mut events, 0).await;
    assert_eq!(seq.preloading_entry(), Some(1));

    seq.skip(3).unwrap();
    wait_playing(&mut events, 3).await;

    let preloaded = recorder.slot(1);
    assert_eq!(*preloaded.entry(), 1);
    assert_eq!(preloaded.count("end"), 1);

    // Its load finishing later changes nothing
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(preloaded.count("start"), 0);
    assert_eq!(seq.playing_entry(), Some(3));
}

// ============================================================================
// Auto-advance and retry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_auto_advance_plays_everything_then_stops() {
    let recorder = SlotRecorder::with_default(auto_ending());
    let seq = sequencer(&recorder, entries_producer(5));
    let mut events = seq.subscribe();

    seq.play();
    seq.skip(0).unwrap();
    let seen = events_until_stopped(&mut events).await;

    assert_eq!(playing_entries(&seen), vec![0, 1, 2, 3, 4]);
    assert_eq!(coming_next_count(&seen), 5);
    let stops = seen
        .iter()
        .filter(|e| e.is_transition_to(SequencerState::Stopped))
        .count();
    assert_eq!(stops, 1);
    assert_eq!(seq.state(), SequencerState::Stopped);

    assert!(seen.contains(&PlaybackEvent::ComingNext {
        current: 0,
        next: Some(1),
    }));
    assert!(seen.contains(&PlaybackEvent::ComingNext {
        current: 4,
        next: None,
    }));
}

#[tokio::test(start_paused = true)]
async fn test_skip_retries_next_entries() {
    let recorder = SlotRecorder::new();
    for entry in 0..3 {
        recorder.set_behavior(entry, failing());
    }
    let seq = sequencer(&recorder, entries_producer(5));
    let mut events = seq.subscribe();

    seq.play();
    seq.skip(0).unwrap();
    let seen = wait_playing(&mut events, 3).await;

    assert_eq!(failed_entries(&seen), vec![0, 1, 2]);
    assert_eq!(recorder.slot(3).count("start"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_auto_advance_retries_next_entries() {
    let recorder = SlotRecorder::new();
    recorder.set_behavior(0, auto_ending());
    recorder.set_behavior(1, failing());
    recorder.set_behavior(2, failing());
    let seq = sequencer(&recorder, entries_producer(4));
    let mut events = seq.subscribe();

    seq.play();
    seq.skip(0).unwrap();
    let mut seen = wait_playing(&mut events, 3).await;
    settle().await;
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }

    assert_eq!(failed_entries(&seen), vec![1, 2]);
    assert_eq!(playing_entries(&seen), vec![0, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_every_failure_reported_then_stopped() {
    let recorder = SlotRecorder::with_default(failing());
    let seq = sequencer(&recorder, entries_producer(5));
    let mut events = seq.subscribe();

    seq.play();
    seq.skip(0).unwrap();
    let seen = events_until_stopped(&mut events).await;

    assert_eq!(failed_entries(&seen), vec![0, 1, 2, 3, 4]);
    assert!(playing_entries(&seen).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stopped_after_last_valid_entry() {
    let recorder = SlotRecorder::with_default(failing());
    recorder.set_behavior(0, auto_ending());
    let seq = sequencer(&recorder, entries_producer(5));
    let mut events = seq.subscribe();

    seq.play();
    seq.skip(0).unwrap();
    let seen = events_until_stopped(&mut events).await;

    let transitions: Vec<_> = seen
        .iter()
        .filter_map(|e| match e {
            PlaybackEvent::StateChanged { previous, current } => Some((*previous, *current)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (SequencerState::Pristine, SequencerState::Playing),
            (SequencerState::Playing, SequencerState::Stopped),
        ]
    );
    assert_eq!(failed_entries(&seen), vec![1, 2, 3, 4]);
}

// ============================================================================
// Cues
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_coming_next_prefers_skipping_entry() {
    let recorder = SlotRecorder::new();
    recorder.set_behavior(
        3,
        SlotBehavior {
            load_delay: Some(Duration::from_secs(10)),
            ..SlotBehavior::default()
        },
    );
    let seq = sequencer(&recorder, entries_producer(5));
    let mut events = seq.subscribe();

    seq.play();
    seq.skip(0).unwrap();
    wait_playing(&mut events, 0).await;
    seq.skip(3).unwrap();
    assert_eq!(seq.skipping_entry(), Some(3));

    recorder.slot(0).fire_ending_soon();
    let seen = events_until(&mut events, |e| matches!(e, PlaybackEvent::ComingNext { .. })).await;
    assert_eq!(
        seen.last(),
        Some(&PlaybackEvent::ComingNext {
            current: 0,
            next: Some(3),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_cues_of_superseded_slots_are_ignored() {
    let recorder = SlotRecorder::new();
    let seq = sequencer(&recorder, entries_producer(5));
    let mut events = seq.subscribe();

    seq.play();
    seq.skip(0).unwrap();
    wait_playing(&mut events, 0).await;
    seq.skip(3).unwrap();
    wait_playing(&mut events, 3).await;
    settle().await;
    while events.try_recv().is_ok() {}

    let old = recorder.slot(0);
    old.fire_ending_soon();
    old.fire_ending();
    settle().await;

    assert!(events.try_recv().is_err());
    assert_eq!(seq.playing_entry(), Some(3));
}

// ============================================================================
// Stop / check next entry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_stop_ends_everything() {
    let recorder = SlotRecorder::new();
    let seq = sequencer(&recorder, entries_producer(5));
    let mut events = seq.subscribe();

    seq.play();
    seq.skip(0).unwrap();
    wait_playing(&mut events, 0).await;

    seq.stop().unwrap();
    events_until_stopped(&mut events).await;

    for slot in recorder.slots() {
        assert_eq!(slot.count("end"), 1);
    }
    assert_eq!(seq.playing_entry(), None);
    assert_eq!(seq.preloading_entry(), None);

    // Stopped is not terminal
    seq.skip(2).unwrap();
    seq.play();
    wait_playing(&mut events, 2).await;
    assert_eq!(recorder.slots().last().unwrap().count("proceed"), 1);
    assert_eq!(seq.state(), SequencerState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_play_stays_pristine() {
    let recorder = SlotRecorder::new();
    let seq = sequencer(&recorder, no_next_entry());

    seq.stop().unwrap();
    assert_eq!(seq.state(), SequencerState::Pristine);
}

#[tokio::test(start_paused = true)]
async fn test_check_next_entry_replaces_preload() {
    let order = Arc::new(Mutex::new(vec![0usize, 1, 2]));
    let shared = order.clone();
    let next: NextEntryProducer<usize> = Arc::new(move |entry: Option<&usize>| {
        let order = shared.lock().unwrap();
        let index = match entry {
            None => 0,
            Some(e) => order.iter().position(|o| o == e)? + 1,
        };
        order.get(index).copied()
    });
    let recorder = SlotRecorder::new();
    let seq = sequencer(&recorder, next);
    let mut events = seq.subscribe();

    seq.play();
    seq.skip(0).unwrap();
    wait_playing(&mut events, 0).await;
    assert_eq!(seq.preloading_entry(), Some(1));

    // Unchanged: nothing happens
    seq.check_next_entry().unwrap();
    assert_eq!(recorder.entries(), vec![0, 1]);

    order.lock().unwrap().retain(|e| *e != 1);
    seq.check_next_entry().unwrap();

    assert_eq!(seq.preloading_entry(), Some(2));
    assert_eq!(recorder.entries(), vec![0, 1, 2]);
    assert_eq!(recorder.slot(1).count("end"), 1);

    order.lock().unwrap().truncate(1);
    seq.check_next_entry().unwrap();
    assert_eq!(seq.preloading_entry(), None);
    assert_eq!(seq.state(), SequencerState::Playing);
}
