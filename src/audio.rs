//! Sound cues
//!
//! Effects are described as short procedural tones; a `SoundPlayer` backend
//! decides how (or whether) to actually produce them.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::sim::GameEvent;

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundEffect {
    /// Card turned face up or back down
    Flip,
    /// Pair matched
    Success,
    /// Pair mismatched
    Failure,
    /// Board cleared
    Win,
}

impl From<GameEvent> for SoundEffect {
    fn from(event: GameEvent) -> Self {
        match event {
            GameEvent::Flip => Self::Flip,
            GameEvent::Success => Self::Success,
            GameEvent::Failure => Self::Failure,
            GameEvent::Win => Self::Win,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
}

/// One oscillator note
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub freq: f32,
    /// Offset from the start of the effect
    pub start_ms: u32,
    pub duration_ms: u32,
    pub waveform: Waveform,
    /// Peak gain before volume scaling
    pub gain: f32,
}

const fn tone(freq: f32, start_ms: u32, duration_ms: u32, waveform: Waveform, gain: f32) -> Tone {
    Tone {
        freq,
        start_ms,
        duration_ms,
        waveform,
        gain,
    }
}

/// Short soft tick
const FLIP_TONES: &[Tone] = &[tone(520.0, 0, 60, Waveform::Triangle, 0.3)];
/// Rising pair
const SUCCESS_TONES: &[Tone] = &[
    tone(660.0, 0, 90, Waveform::Sine, 0.4),
    tone(880.0, 80, 140, Waveform::Sine, 0.4),
];
/// Low buzz
const FAILURE_TONES: &[Tone] = &[tone(140.0, 0, 220, Waveform::Square, 0.2)];
/// Major arpeggio
const WIN_TONES: &[Tone] = &[
    tone(523.0, 0, 150, Waveform::Sine, 0.5),
    tone(659.0, 120, 150, Waveform::Sine, 0.5),
    tone(784.0, 240, 150, Waveform::Sine, 0.5),
    tone(1047.0, 360, 400, Waveform::Sine, 0.5),
];

impl SoundEffect {
    pub fn tones(self) -> &'static [Tone] {
        match self {
            Self::Flip => FLIP_TONES,
            Self::Success => SUCCESS_TONES,
            Self::Failure => FAILURE_TONES,
            Self::Win => WIN_TONES,
        }
    }
}

/// Output backend for rendered tones
pub trait SoundPlayer: Send + Sync {
    fn play(&self, effect: SoundEffect, tones: &[Tone], volume: f32);
}

/// Backend that only logs what it would play
#[derive(Debug, Default)]
pub struct LogSoundPlayer;

impl SoundPlayer for LogSoundPlayer {
    fn play(&self, effect: SoundEffect, tones: &[Tone], volume: f32) {
        log::debug!("Sound {effect:?}: {} tones at volume {volume:.2}", tones.len());
    }
}

/// Audio manager for the game
pub struct AudioManager {
    player: Arc<dyn SoundPlayer>,
    master_volume: f32,
    sfx_volume: f32,
    muted: bool,
}

impl AudioManager {
    pub fn new(player: Arc<dyn SoundPlayer>) -> Self {
        Self {
            player,
            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,
        }
    }

    /// Set master volume (0.0 - 1.0)
    pub fn set_master_volume(&mut self, vol: f32) {
        self.master_volume = vol.clamp(0.0, 1.0);
    }

    /// Set SFX volume (0.0 - 1.0)
    pub fn set_sfx_volume(&mut self, vol: f32) {
        self.sfx_volume = vol.clamp(0.0, 1.0);
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master_volume * self.sfx_volume
        }
    }

    pub fn play(&self, effect: SoundEffect) {
        let vol = self.effective_volume();
        if vol <= 0.0 {
            return;
        }
        self.player.play(effect, effect.tones(), vol);
    }
}

/// Play a cue for every game event until the channel closes.
///
/// A slow player drops cues rather than holding up the game.
pub fn spawn_cue_dispatcher(
    mut events: broadcast::Receiver<GameEvent>,
    audio: AudioManager,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => audio.play(event.into()),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Skipped {skipped} sound cues");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
