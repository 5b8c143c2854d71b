use rodio::Source;
use serde::Serialize;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind", content = "direction")]
pub enum ToneKind {
    Success,
    Caution,
    Danger,
    Critical,
    Directional(Direction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
}

/// Exponential decay from `peak` towards `floor`, repeated `pulses` times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainEnvelope {
    pub peak: f32,
    pub floor: f32,
    pub decay_ms: u32,
    pub pulses: u32,
    pub pulse_period_ms: u32,
}

impl GainEnvelope {
    pub fn single(peak: f32, decay_ms: u32) -> Self {
        Self {
            peak,
            floor: 0.01,
            decay_ms,
            pulses: 1,
            pulse_period_ms: decay_ms,
        }
    }

    pub fn gain_at(&self, elapsed_ms: f32) -> f32 {
        if self.pulses == 0 || self.decay_ms == 0 || elapsed_ms < 0.0 {
            return 0.0;
        }
        let period = self.pulse_period_ms.max(1) as f32;
        let pulse = (elapsed_ms / period) as u32;
        if pulse >= self.pulses {
            return 0.0;
        }

        let local = elapsed_ms - pulse as f32 * period;
        let decay = self.decay_ms as f32;
        if local > decay {
            return 0.0;
        }
        self.peak * (self.floor / self.peak).powf(local / decay)
    }
}

/// Everything a tone synthesizer needs: frequency, waveform, duration and envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSpec {
    pub frequency_hz: f32,
    pub waveform: Waveform,
    pub duration_ms: u32,
    pub envelope: GainEnvelope,
    /// -1.0 (left) ..= 1.0 (right)
    pub pan: f32,
}

impl ToneKind {
    pub fn spec(&self) -> ToneSpec {
        match self {
            ToneKind::Success | ToneKind::Caution | ToneKind::Danger => ToneSpec {
                frequency_hz: 800.0,
                waveform: Waveform::Sine,
                duration_ms: 500,
                envelope: GainEnvelope::single(0.3, 500),
                pan: 0.0,
            },
            ToneKind::Critical => ToneSpec {
                frequency_hz: 1000.0,
                waveform: Waveform::Square,
                duration_ms: 1000,
                envelope: GainEnvelope {
                    peak: 0.3,
                    floor: 0.01,
                    decay_ms: 100,
                    pulses: 5,
                    pulse_period_ms: 200,
                },
                pan: 0.0,
            },
            ToneKind::Directional(direction) => {
                let (frequency_hz, pan) = match direction {
                    Direction::Left => (600.0, -0.9),
                    Direction::Right => (600.0, 0.9),
                    Direction::Up => (800.0, 0.0),
                    Direction::Down => (400.0, 0.0),
                };
                ToneSpec {
                    frequency_hz,
                    waveform: Waveform::Square,
                    duration_ms: 200,
                    envelope: GainEnvelope::single(0.2, 200),
                    pan,
                }
            }
        }
    }
}

/// Finite stereo tone rendered from a [`ToneSpec`].
pub struct ToneSource {
    spec: ToneSpec,
    sample_rate: u32,
    total_frames: u64,
    num_sample: u64,
}

impl ToneSource {
    pub fn new(spec: ToneSpec) -> Self {
        let total_frames = u64::from(SAMPLE_RATE) * u64::from(spec.duration_ms) / 1000;
        Self {
            spec,
            sample_rate: SAMPLE_RATE,
            total_frames,
            num_sample: 0,
        }
    }

    fn channel_gain(&self, right: bool) -> f32 {
        let pan = self.spec.pan.clamp(-1.0, 1.0);
        if right {
            (1.0 + pan).min(1.0)
        } else {
            (1.0 - pan).min(1.0)
        }
    }
}

impl Iterator for ToneSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.num_sample / 2;
        if frame >= self.total_frames {
            return None;
        }
        let right = self.num_sample % 2 == 1;
        self.num_sample += 1;

        let t = frame as f32 / self.sample_rate as f32;
        let phase = (2.0 * PI * self.spec.frequency_hz * t).sin();
        let wave = match self.spec.waveform {
            Waveform::Sine => phase,
            Waveform::Square => {
                if phase >= 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
        };

        Some(wave * self.spec.envelope.gain_at(t * 1000.0) * self.channel_gain(right))
    }
}

impl Source for ToneSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_millis(u64::from(self.spec.duration_ms)))
    }
}
