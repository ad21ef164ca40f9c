//! Playback scheduling: keeps displayed frames in lock-step with the audio
//! clock and processes pause/resume/cancel input.
//!
//! The scheduler is a single cooperative polling loop. The audio engine owns
//! its own clock; the loop reads it every tick and never mutates the engine
//! except through explicit play/pause/stop calls, so there is exactly one
//! reader of the clock and one writer of transport state.

use std::time::Duration;

use anyhow::{bail, Result};

use crate::terminal::{Key, Surface};
use crate::FrameSequence;

/// Transport controls and clock of the audio engine, as seen by the
/// scheduler. Implemented by [`crate::audio::AudioPlayer`] and by scripted
/// fakes in tests.
pub trait AudioTransport {
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    /// Elapsed playback position. May transiently report a value at or past
    /// the total length near end-of-track.
    fn position(&self) -> Duration;
    /// Total track length, fixed once loaded.
    fn total_len(&self) -> Duration;
}

/// Playback session state. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
    Stopped,
}

/// Control input fed to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Start,
    Toggle,
    Cancel,
}

/// Side effect a transition asks the scheduler to apply to the audio engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCommand {
    Resume,
    Pause,
    Stop,
}

impl PlaybackState {
    /// Pure transition function.
    ///
    /// Toggle flips Playing and Paused (resuming preserves the elapsed
    /// position), Cancel reaches Stopped from any non-terminal state, and
    /// everything else is a no-op.
    pub fn apply(self, control: Control) -> (PlaybackState, Option<AudioCommand>) {
        use PlaybackState::{Idle, Paused, Playing, Stopped};
        match (self, control) {
            (Stopped, _) => (Stopped, None),
            (Idle, Control::Start) => (Playing, Some(AudioCommand::Resume)),
            (Playing, Control::Toggle) => (Paused, Some(AudioCommand::Pause)),
            (Paused, Control::Toggle) => (Playing, Some(AudioCommand::Resume)),
            (_, Control::Cancel) => (Stopped, Some(AudioCommand::Stop)),
            (state, _) => (state, None),
        }
    }

    pub fn is_terminal(self) -> bool {
        self == PlaybackState::Stopped
    }
}

/// Frame to display for the given audio clock sample, or `None` at
/// end-of-track.
///
/// `index = floor(elapsed / total * frame_count)`. A clock that reports a
/// position at or past the total length, or a degenerate zero-length track,
/// yields `None` rather than an out-of-range index.
///
/// ```
/// use std::time::Duration;
/// use plascii::playback::frame_index_at;
///
/// let total = Duration::from_secs(10);
/// assert_eq!(frame_index_at(Duration::from_millis(4500), total, 10), Some(4));
/// assert_eq!(frame_index_at(Duration::from_millis(10_100), total, 10), None);
/// ```
pub fn frame_index_at(elapsed: Duration, total: Duration, frame_count: usize) -> Option<usize> {
    if frame_count == 0 || total.is_zero() {
        return None;
    }
    let index = (elapsed.as_secs_f64() / total.as_secs_f64() * frame_count as f64) as usize;
    (index < frame_count).then_some(index)
}

/// Drives one playback session: repeatedly selects the frame matching the
/// audio position, overwrites the terminal grid in place, and applies
/// control input, until the session reaches `Stopped`.
pub struct Scheduler<'a, A: AudioTransport, S: Surface> {
    frames: &'a FrameSequence,
    audio: A,
    surface: &'a mut S,
    tick: Duration,
    state: PlaybackState,
}

impl<'a, A: AudioTransport, S: Surface> Scheduler<'a, A, S> {
    /// Refuses empty sequences: with zero frames there is nothing to
    /// schedule and playback must not be attempted.
    pub fn new(
        frames: &'a FrameSequence,
        audio: A,
        surface: &'a mut S,
        tick: Duration,
    ) -> Result<Self> {
        if frames.is_empty() {
            bail!("frame sequence is empty; refusing to start playback");
        }
        Ok(Self {
            frames,
            audio,
            surface,
            tick,
            state: PlaybackState::Idle,
        })
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Run the polling loop until playback stops, via end-of-track or
    /// cancellation. The audio engine is stopped on every exit path.
    ///
    /// Each iteration re-polls the audio clock and the input device without
    /// blocking, then sleeps for the tick interval. The tick bounds CPU
    /// usage; it is advisory pacing, not a frame-rate guarantee.
    pub fn run(mut self) -> Result<()> {
        self.surface.clear()?;
        self.dispatch(Control::Start);

        while !self.state.is_terminal() {
            if self.state == PlaybackState::Playing {
                let elapsed = self.audio.position();
                let total = self.audio.total_len();
                match frame_index_at(elapsed, total, self.frames.len()) {
                    Some(index) => {
                        if let Some(frame) = self.frames.get(index) {
                            // Overwrite in place so the scrollback does not grow.
                            self.surface.set_cursor(0, 0)?;
                            self.surface.write(frame.text())?;
                        }
                    }
                    None => {
                        self.state = PlaybackState::Stopped;
                        break;
                    }
                }
            }

            if let Some(key) = self.surface.poll_key()? {
                let control = match key {
                    Key::Toggle => Control::Toggle,
                    Key::Cancel => Control::Cancel,
                };
                self.dispatch(control);
            }
            if self.state.is_terminal() {
                break;
            }

            std::thread::sleep(self.tick);
        }

        // Release the audio engine no matter which path ended the loop.
        self.audio.stop();
        Ok(())
    }

    fn dispatch(&mut self, control: Control) {
        let (next, command) = self.state.apply(control);
        self.state = next;
        match command {
            Some(AudioCommand::Resume) => self.audio.play(),
            Some(AudioCommand::Pause) => self.audio.pause(),
            Some(AudioCommand::Stop) => self.audio.stop(),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_sequence, GlyphRamp};
    use std::cell::Cell;
    use std::collections::VecDeque;

    #[test]
    fn frame_index_matches_clock_ratio() {
        let total = Duration::from_secs(10);
        assert_eq!(frame_index_at(Duration::ZERO, total, 10), Some(0));
        assert_eq!(frame_index_at(Duration::from_millis(4500), total, 10), Some(4));
        assert_eq!(frame_index_at(Duration::from_millis(9999), total, 10), Some(9));
    }

    #[test]
    fn frame_index_past_end_is_end_of_track() {
        let total = Duration::from_secs(10);
        assert_eq!(frame_index_at(total, total, 10), None);
        assert_eq!(frame_index_at(Duration::from_millis(10_100), total, 10), None);
    }

    #[test]
    fn degenerate_audio_is_end_of_track() {
        assert_eq!(frame_index_at(Duration::ZERO, Duration::ZERO, 10), None);
        assert_eq!(frame_index_at(Duration::from_secs(1), Duration::from_secs(10), 0), None);
    }

    #[test]
    fn transitions_follow_the_state_machine() {
        use AudioCommand::{Pause, Resume, Stop};
        use PlaybackState::{Idle, Paused, Playing, Stopped};

        assert_eq!(Idle.apply(Control::Start), (Playing, Some(Resume)));
        assert_eq!(Playing.apply(Control::Toggle), (Paused, Some(Pause)));
        assert_eq!(Paused.apply(Control::Toggle), (Playing, Some(Resume)));
        assert_eq!(Playing.apply(Control::Cancel), (Stopped, Some(Stop)));
        assert_eq!(Paused.apply(Control::Cancel), (Stopped, Some(Stop)));
        assert_eq!(Idle.apply(Control::Cancel), (Stopped, Some(Stop)));

        // No-ops: toggling before start, starting twice, anything after stop.
        assert_eq!(Idle.apply(Control::Toggle), (Idle, None));
        assert_eq!(Playing.apply(Control::Start), (Playing, None));
        assert_eq!(Stopped.apply(Control::Toggle), (Stopped, None));
        assert_eq!(Stopped.apply(Control::Cancel), (Stopped, None));
    }

    /// Audio fake whose clock advances through a scripted list of positions,
    /// repeating the last one once exhausted.
    struct ScriptedAudio {
        positions: Vec<Duration>,
        cursor: Cell<usize>,
        total: Duration,
        playing: Cell<bool>,
        stopped: Cell<bool>,
    }

    impl ScriptedAudio {
        fn new(total: Duration, positions: Vec<Duration>) -> Self {
            Self {
                positions,
                cursor: Cell::new(0),
                total,
                playing: Cell::new(false),
                stopped: Cell::new(false),
            }
        }
    }

    impl AudioTransport for &ScriptedAudio {
        fn play(&mut self) {
            self.playing.set(true);
        }
        fn pause(&mut self) {
            self.playing.set(false);
        }
        fn stop(&mut self) {
            self.playing.set(false);
            self.stopped.set(true);
        }
        fn position(&self) -> Duration {
            let i = self.cursor.get();
            self.cursor.set(i + 1);
            self.positions
                .get(i)
                .or_else(|| self.positions.last())
                .copied()
                .unwrap_or(Duration::ZERO)
        }
        fn total_len(&self) -> Duration {
            self.total
        }
    }

    /// Surface fake that records writes and feeds scripted keys.
    struct RecordingSurface {
        writes: Vec<String>,
        keys: VecDeque<Option<Key>>,
    }

    impl RecordingSurface {
        fn new(keys: Vec<Option<Key>>) -> Self {
            Self {
                writes: Vec::new(),
                keys: keys.into(),
            }
        }
    }

    impl Surface for RecordingSurface {
        fn clear(&mut self) -> Result<()> {
            Ok(())
        }
        fn set_cursor(&mut self, _col: u16, _row: u16) -> Result<()> {
            Ok(())
        }
        fn write(&mut self, text: &str) -> Result<()> {
            self.writes.push(text.to_string());
            Ok(())
        }
        fn poll_key(&mut self) -> Result<Option<Key>> {
            Ok(self.keys.pop_front().flatten())
        }
    }

    fn two_frame_sequence() -> crate::FrameSequence {
        let dir = tempfile::tempdir().unwrap();
        for (index, shade) in [(1usize, 0u8), (2, 255)] {
            let img = image::GrayImage::from_pixel(2, 1, image::Luma([shade]));
            img.save(dir.path().join(format!("frame_{:04}.png", index))).unwrap();
        }
        build_sequence(dir.path(), &GlyphRamp::default(), |_, _| {}).unwrap()
    }

    #[test]
    fn scheduler_rejects_empty_sequence() {
        let frames = crate::FrameSequence::default();
        let audio = ScriptedAudio::new(Duration::from_secs(1), vec![]);
        let mut surface = RecordingSurface::new(vec![]);
        assert!(Scheduler::new(&frames, &audio, &mut surface, Duration::ZERO).is_err());
    }

    #[test]
    fn scheduler_plays_frames_in_clock_order_and_stops_at_end() {
        let frames = two_frame_sequence();
        let total = Duration::from_secs(10);
        let audio = ScriptedAudio::new(
            total,
            vec![
                Duration::ZERO,              // frame 0
                Duration::from_secs(6),      // frame 1
                Duration::from_millis(10_100), // past the end
            ],
        );
        let mut surface = RecordingSurface::new(vec![]);

        let scheduler =
            Scheduler::new(&frames, &audio, &mut surface, Duration::ZERO).unwrap();
        scheduler.run().unwrap();

        assert_eq!(surface.writes.len(), 2);
        assert_eq!(surface.writes[0], frames.get(0).unwrap().text());
        assert_eq!(surface.writes[1], frames.get(1).unwrap().text());
        assert!(audio.stopped.get(), "audio must be released at end-of-track");
    }

    #[test]
    fn pause_freezes_display_and_resume_preserves_position() {
        let frames = two_frame_sequence();
        let total = Duration::from_secs(10);
        // Clock frozen at 6s for the whole session.
        let audio = ScriptedAudio::new(total, vec![Duration::from_secs(6)]);
        let mut surface = RecordingSurface::new(vec![
            Some(Key::Toggle), // pause after the first displayed frame
            None,              // paused tick: nothing drawn
            None,
            Some(Key::Toggle), // resume
            Some(Key::Cancel), // one more frame, then stop
        ]);

        let scheduler =
            Scheduler::new(&frames, &audio, &mut surface, Duration::ZERO).unwrap();
        scheduler.run().unwrap();

        // One write before the pause, one after the resume; nothing while
        // paused, and the frame is unchanged because the clock did not move.
        assert_eq!(surface.writes.len(), 2);
        assert_eq!(surface.writes[0], surface.writes[1]);
        assert!(audio.stopped.get());
    }

    #[test]
    fn cancel_stops_audio_immediately() {
        let frames = two_frame_sequence();
        let audio = ScriptedAudio::new(Duration::from_secs(10), vec![Duration::ZERO]);
        let mut surface = RecordingSurface::new(vec![Some(Key::Cancel)]);

        let scheduler =
            Scheduler::new(&frames, &audio, &mut surface, Duration::ZERO).unwrap();
        scheduler.run().unwrap();

        assert_eq!(surface.writes.len(), 1);
        assert!(audio.stopped.get());
        assert!(!audio.playing.get());
    }

    #[test]
    fn degenerate_track_ends_without_drawing() {
        let frames = two_frame_sequence();
        let audio = ScriptedAudio::new(Duration::ZERO, vec![Duration::ZERO]);
        let mut surface = RecordingSurface::new(vec![]);

        let scheduler =
            Scheduler::new(&frames, &audio, &mut surface, Duration::ZERO).unwrap();
        scheduler.run().unwrap();

        assert!(surface.writes.is_empty());
        assert!(audio.stopped.get());
    }
}
