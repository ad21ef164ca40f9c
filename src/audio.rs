//! Rodio-backed audio engine.
//!
//! The engine owns its own playback thread and clock; the scheduler only
//! issues play/pause/stop and reads the reported position.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use crate::playback::AudioTransport;

/// Handle on a loaded audio track. Dropping it releases the output device.
pub struct AudioPlayer {
    // The stream must outlive the sink or playback goes silent.
    _stream: OutputStream,
    _handle: OutputStreamHandle,
    sink: Sink,
    total: Duration,
}

impl AudioPlayer {
    /// Decode `path` into a paused sink; playback starts on `play()`.
    ///
    /// The total track length is captured at load time and stays fixed for
    /// the session. A source that cannot report one is treated as zero
    /// length, which the scheduler handles as immediate end-of-track.
    pub fn load(path: &Path) -> Result<Self> {
        let (stream, handle) =
            OutputStream::try_default().context("opening audio output device")?;
        let sink = Sink::try_new(&handle).context("creating audio sink")?;
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let source = Decoder::new(BufReader::new(file))
            .with_context(|| format!("decoding {}", path.display()))?;
        let total = source.total_duration().unwrap_or_default();
        sink.append(source);
        sink.pause();
        Ok(Self {
            _stream: stream,
            _handle: handle,
            sink,
            total,
        })
    }
}

impl AudioTransport for AudioPlayer {
    fn play(&mut self) {
        self.sink.play();
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn stop(&mut self) {
        self.sink.stop();
    }

    fn position(&self) -> Duration {
        self.sink.get_pos()
    }

    fn total_len(&self) -> Duration {
        self.total
    }
}
