//! Microphone capture
//!
//! [`Segmenter`] does the listening logic on plain sample chunks: wait for
//! the level to cross the energy threshold, keep a short pre-roll so the
//! first syllable is not clipped, and stop on a long enough pause or at the
//! phrase limit. The cpal-backed [`MicrophoneCapture`] only feeds it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use super::{CaptureSettings, PipelineError, RawAudio, SpeechCapture};

/// Audio kept from before speech started
const PREROLL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStatus {
    /// No speech yet
    Waiting,
    Speaking,
    /// A phrase was captured
    Done,
    /// Nobody spoke before the listen timeout
    TimedOut,
}

fn samples_for(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * sample_rate as f64).round() as usize
}

/// Root mean square of a chunk, on the 16-bit scale
pub fn rms(chunk: &[i16]) -> f32 {
    if chunk.is_empty() {
        return 0.0;
    }
    let sum: f64 = chunk.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / chunk.len() as f64).sqrt() as f32
}

pub struct Segmenter {
    sample_rate: u32,
    energy_threshold: f32,
    timeout_samples: usize,
    phrase_samples: usize,
    pause_samples: usize,
    preroll_samples: usize,
    status: SegmentStatus,
    waited: usize,
    silence: usize,
    preroll: VecDeque<i16>,
    captured: Vec<i16>,
}

impl Segmenter {
    pub fn new(settings: &CaptureSettings, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            energy_threshold: settings.energy_threshold,
            timeout_samples: samples_for(settings.listen_timeout, sample_rate),
            phrase_samples: samples_for(settings.phrase_limit, sample_rate),
            pause_samples: samples_for(settings.pause_threshold, sample_rate),
            preroll_samples: samples_for(PREROLL, sample_rate),
            status: SegmentStatus::Waiting,
            waited: 0,
            silence: 0,
            preroll: VecDeque::new(),
            captured: Vec::new(),
        }
    }

    pub fn status(&self) -> SegmentStatus {
        self.status
    }

    /// Feed one chunk of mono samples
    pub fn push(&mut self, chunk: &[i16]) -> SegmentStatus {
        let loud = rms(chunk) > self.energy_threshold;
        match self.status {
            SegmentStatus::Waiting => {
                if loud {
                    self.captured.extend(self.preroll.drain(..));
                    self.captured.extend_from_slice(chunk);
                    self.status = SegmentStatus::Speaking;
                } else {
                    self.waited += chunk.len();
                    self.preroll.extend(chunk.iter().copied());
                    while self.preroll.len() > self.preroll_samples {
                        self.preroll.pop_front();
                    }
                    if self.waited >= self.timeout_samples {
                        self.status = SegmentStatus::TimedOut;
                    }
                }
            }
            SegmentStatus::Speaking => {
                self.captured.extend_from_slice(chunk);
                if loud {
                    self.silence = 0;
                } else {
                    self.silence += chunk.len();
                }
                if self.silence >= self.pause_samples || self.captured.len() >= self.phrase_samples
                {
                    self.captured.truncate(self.phrase_samples);
                    self.status = SegmentStatus::Done;
                }
            }
            SegmentStatus::Done | SegmentStatus::TimedOut => {}
        }
        self.status
    }

    /// The audio captured so far, or the matching failure
    pub fn finish(self) -> Result<RawAudio, PipelineError> {
        match self.status {
            SegmentStatus::Waiting | SegmentStatus::TimedOut => Err(PipelineError::TimedOut),
            SegmentStatus::Speaking | SegmentStatus::Done => Ok(RawAudio {
                samples: self.captured,
                sample_rate: self.sample_rate,
            }),
        }
    }
}

/// Stand-in used when the binary was built without the `microphone` feature
pub struct UnavailableCapture;

impl SpeechCapture for UnavailableCapture {
    fn capture(&self, _settings: &CaptureSettings) -> Result<RawAudio, PipelineError> {
        Err(PipelineError::Mic(
            "microphone support not built in (enable the `microphone` feature)".to_string(),
        ))
    }
}

#[cfg(feature = "microphone")]
pub use mic::MicrophoneCapture;

/// The capture backend this build supports
pub fn default_capture() -> Arc<dyn SpeechCapture> {
    #[cfg(feature = "microphone")]
    {
        Arc::new(MicrophoneCapture)
    }
    #[cfg(not(feature = "microphone"))]
    {
        Arc::new(UnavailableCapture)
    }
}

#[cfg(feature = "microphone")]
mod mic {
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    use cpal::traits::{DeviceTrait as _, HostTrait as _, StreamTrait as _};
    use tracing::{debug, warn};

    use super::{CaptureSettings, PipelineError, RawAudio, Segmenter, SegmentStatus, SpeechCapture};

    /// Default input device through cpal
    pub struct MicrophoneCapture;

    fn mic_err(context: &str, err: impl std::fmt::Display) -> PipelineError {
        PipelineError::Mic(format!("{context}: {err}"))
    }

    /// Downmix interleaved frames to mono i16
    fn to_mono<T>(data: &[T], channels: usize) -> Vec<i16>
    where
        T: cpal::Sample,
        i16: cpal::FromSample<T>,
    {
        data.chunks(channels.max(1))
            .map(|frame| {
                let sum: i32 = frame
                    .iter()
                    .map(|&s| <i16 as cpal::FromSample<T>>::from_sample_(s) as i32)
                    .sum();
                (sum / frame.len() as i32) as i16
            })
            .collect()
    }

    impl SpeechCapture for MicrophoneCapture {
        fn capture(&self, settings: &CaptureSettings) -> Result<RawAudio, PipelineError> {
            let host = cpal::default_host();
            let device = host
                .default_input_device()
                .ok_or_else(|| PipelineError::Mic("no default input device".to_string()))?;
            let supported = device
                .default_input_config()
                .map_err(|e| mic_err("default_input_config", e))?;
            let config = supported.config();
            let channels = config.channels as usize;
            let sample_rate = config.sample_rate.0;
            debug!("Capturing at {} Hz, {} channel(s)", sample_rate, channels);

            let (tx, rx) = mpsc::channel::<Vec<i16>>();
            let err_fn = |err| warn!("audio input stream error: {}", err);

            let stream = match supported.sample_format() {
                cpal::SampleFormat::F32 => device.build_input_stream(
                    &config,
                    move |data: &[f32], _| {
                        let _ = tx.send(to_mono(data, channels));
                    },
                    err_fn,
                    None,
                ),
                cpal::SampleFormat::I16 => device.build_input_stream(
                    &config,
                    move |data: &[i16], _| {
                        let _ = tx.send(to_mono(data, channels));
                    },
                    err_fn,
                    None,
                ),
                cpal::SampleFormat::U16 => device.build_input_stream(
                    &config,
                    move |data: &[u16], _| {
                        let _ = tx.send(to_mono(data, channels));
                    },
                    err_fn,
                    None,
                ),
                other => {
                    return Err(PipelineError::Mic(format!(
                        "unsupported sample format: {other:?}"
                    )))
                }
            }
            .map_err(|e| mic_err("build_input_stream", e))?;
            stream.play().map_err(|e| mic_err("play", e))?;

            let mut segmenter = Segmenter::new(settings, sample_rate);
            let deadline =
                Instant::now() + settings.listen_timeout + settings.phrase_limit + Duration::from_secs(1);
            while Instant::now() < deadline {
                match rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(chunk) => {
                        if matches!(
                            segmenter.push(&chunk),
                            SegmentStatus::Done | SegmentStatus::TimedOut
                        ) {
                            break;
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => continue,
                    Err(mpsc::RecvTimeoutError::Disconnected) => {
                        return Err(PipelineError::Mic("input stream closed".to_string()))
                    }
                }
            }
            drop(stream);
            segmenter.finish()
        }
    }
}
