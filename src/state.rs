use std::time::{Duration, Instant};

/// Playback lifecycle of a recording session.
///
/// Keystrokes are the only thing that moves it forward: the first press
/// starts playback, the reserved key toggles pause, closing the window
/// ends the session from any phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    NotStarted,
    Playing,
    Paused,
}

/// What the shell must do with one key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Start playback. The triggering press is consumed, never logged.
    Start,
    /// Append one response record.
    Log,
    /// Pause playback. Consumed.
    Pause,
    /// Resume playback. Consumed.
    Resume,
    /// Auto-repeat or otherwise non-qualifying press; nothing happens.
    Ignore,
}

/// Decides what a key press means in the current phase.
///
/// Pure so the whole key contract is testable without a window:
/// auto-repeats are dropped in every phase, any first press starts
/// playback, the reserved key pauses, and any press while paused resumes.
pub fn dispatch_key(phase: PlaybackPhase, auto_repeat: bool, is_pause_key: bool) -> KeyAction {
    if auto_repeat {
        return KeyAction::Ignore;
    }
    match phase {
        PlaybackPhase::NotStarted => KeyAction::Start,
        PlaybackPhase::Playing if is_pause_key => KeyAction::Pause,
        PlaybackPhase::Playing => KeyAction::Log,
        PlaybackPhase::Paused => KeyAction::Resume,
    }
}

/// Clock for presentation time: wall time since start minus time spent
/// paused, so logged latencies line up with the stimulus timeline.
///
/// Mutations and queries take an explicit [`Instant`] so the arithmetic
/// runs on synthetic timestamps in tests; the session passes the arrival
/// time of each event.
#[derive(Debug, Clone, Default)]
pub struct PresentationClock {
    started_at: Option<Instant>,
    paused_since: Option<Instant>,
    paused_total: Duration,
}

impl PresentationClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the start of presentation time. Later calls are ignored so
    /// the origin never moves once set.
    pub fn start_at(&mut self, now: Instant) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    pub fn pause_at(&mut self, now: Instant) {
        if self.started_at.is_some() && self.paused_since.is_none() {
            self.paused_since = Some(now);
        }
    }

    pub fn resume_at(&mut self, now: Instant) {
        if let Some(since) = self.paused_since.take() {
            self.paused_total += now.saturating_duration_since(since);
        }
    }

    pub fn started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Presentation time at `now`: zero before start, frozen while paused.
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        let Some(start) = self.started_at else {
            return Duration::ZERO;
        };
        now.saturating_duration_since(start)
            .saturating_sub(self.paused_total_at(now))
    }

    /// Total paused time at `now`, including a pause still in progress.
    pub fn paused_total_at(&self, now: Instant) -> Duration {
        match self.paused_since {
            Some(since) => self.paused_total + now.saturating_duration_since(since),
            None => self.paused_total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn auto_repeat_is_ignored_in_every_phase() {
        for phase in [
            PlaybackPhase::NotStarted,
            PlaybackPhase::Playing,
            PlaybackPhase::Paused,
        ] {
            assert_eq!(dispatch_key(phase, true, false), KeyAction::Ignore);
            assert_eq!(dispatch_key(phase, true, true), KeyAction::Ignore);
        }
    }

    #[test]
    fn any_first_press_starts_even_the_pause_key() {
        assert_eq!(
            dispatch_key(PlaybackPhase::NotStarted, false, false),
            KeyAction::Start
        );
        assert_eq!(
            dispatch_key(PlaybackPhase::NotStarted, false, true),
            KeyAction::Start
        );
    }

    #[test]
    fn playing_logs_ordinary_keys_and_pauses_on_the_reserved_key() {
        assert_eq!(
            dispatch_key(PlaybackPhase::Playing, false, false),
            KeyAction::Log
        );
        assert_eq!(
            dispatch_key(PlaybackPhase::Playing, false, true),
            KeyAction::Pause
        );
    }

    #[test]
    fn any_press_resumes_from_pause() {
        assert_eq!(
            dispatch_key(PlaybackPhase::Paused, false, false),
            KeyAction::Resume
        );
        assert_eq!(
            dispatch_key(PlaybackPhase::Paused, false, true),
            KeyAction::Resume
        );
    }

    #[test]
    fn clock_is_zero_before_start() {
        let clock = PresentationClock::new();
        let now = Instant::now();
        assert_eq!(clock.elapsed_at(now), Duration::ZERO);
        assert!(!clock.started());
    }

    #[test]
    fn clock_measures_from_start() {
        let t0 = Instant::now();
        let mut clock = PresentationClock::new();
        clock.start_at(t0);
        assert_eq!(clock.elapsed_at(t0 + secs(2.0)), secs(2.0));
    }

    #[test]
    fn start_origin_never_moves() {
        let t0 = Instant::now();
        let mut clock = PresentationClock::new();
        clock.start_at(t0);
        clock.start_at(t0 + secs(5.0));
        assert_eq!(clock.elapsed_at(t0 + secs(6.0)), secs(6.0));
    }

    #[test]
    fn paused_interval_is_excluded() {
        let t0 = Instant::now();
        let mut clock = PresentationClock::new();
        clock.start_at(t0);
        clock.pause_at(t0 + secs(5.0));
        clock.resume_at(t0 + secs(8.0));
        // 10s of wall time minus 3s paused.
        assert_eq!(clock.elapsed_at(t0 + secs(10.0)), secs(7.0));
    }

    #[test]
    fn elapsed_is_frozen_while_paused() {
        let t0 = Instant::now();
        let mut clock = PresentationClock::new();
        clock.start_at(t0);
        clock.pause_at(t0 + secs(5.0));
        assert_eq!(clock.elapsed_at(t0 + secs(6.0)), secs(5.0));
        assert_eq!(clock.elapsed_at(t0 + secs(9.5)), secs(5.0));
    }

    #[test]
    fn redundant_pause_and_resume_are_no_ops() {
        let t0 = Instant::now();
        let mut clock = PresentationClock::new();
        clock.pause_at(t0); // before start: ignored
        clock.start_at(t0);
        clock.resume_at(t0 + secs(1.0)); // not paused: ignored
        clock.pause_at(t0 + secs(2.0));
        clock.pause_at(t0 + secs(3.0)); // already paused: ignored
        clock.resume_at(t0 + secs(4.0));
        assert_eq!(clock.elapsed_at(t0 + secs(5.0)), secs(3.0));
    }

    #[test]
    fn paused_total_includes_an_open_pause() {
        let t0 = Instant::now();
        let mut clock = PresentationClock::new();
        clock.start_at(t0);
        clock.pause_at(t0 + secs(1.0));
        assert_eq!(clock.paused_total_at(t0 + secs(4.0)), secs(3.0));
    }
}
