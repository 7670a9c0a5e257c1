//! Fire-and-forget fan-out of fired alerts to the tone player and banner display.

use crate::common::TriggerKey;
use crate::config::FontSpec;
use crate::error::{BellError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Clip length assumed when a clip cannot be inspected.
pub const FALLBACK_CLIP_SECS: f64 = 2.0;
/// Banners never retire sooner than this.
pub const MIN_DISPLAY_SECS: f64 = 5.0;
/// Opacity of the banner overlay.
pub const BANNER_OPACITY: f32 = 0.7;

/// Plays one clip synchronously, returning once it has finished.
pub trait TonePlayer: Send + Sync {
    fn play(&self, clip: &Path) -> Result<()>;
}

/// Renders a banner and blocks until it has retired itself.
pub trait BannerDisplay: Send + Sync {
    fn show(&self, request: &BannerRequest);
}

/// Everything the banner display needs to render one overlay.
#[derive(Debug, Clone)]
pub struct BannerRequest {
    pub text: String,
    pub frame_thickness: u32,
    pub banner_color: String,
    pub text_color: String,
    pub font: FontSpec,
    pub opacity: f32,
    pub duration: Duration,
}

/// A fired alert, resolved against the snapshot that was current when it fired.
#[derive(Debug, Clone)]
pub struct Notification {
    pub key: TriggerKey,
    pub text: String,
    pub banner_color: String,
    pub text_color: String,
    pub clip: PathBuf,
    pub repetitions: u32,
    pub frame_thickness: u32,
    pub font: FontSpec,
}

/// Reads a WAV clip's intrinsic length in seconds.
pub fn clip_duration(clip: &Path) -> Result<f64> {
    let reader = hound::WavReader::open(clip).map_err(|e| BellError::clip(clip, e))?;
    let rate = reader.spec().sample_rate;
    if rate == 0 {
        return Err(BellError::clip(clip, "sample rate is zero"));
    }
    Ok(f64::from(reader.duration()) / f64::from(rate))
}

/// Like `clip_duration`, but falls back to a fixed estimate on failure.
pub fn clip_duration_or_fallback(clip: &Path) -> f64 {
    clip_duration(clip).unwrap_or_else(|e| {
        warn!(error = %e, "Using fallback clip length of {FALLBACK_CLIP_SECS}s.");
        FALLBACK_CLIP_SECS
    })
}

/// How long a banner stays up: the whole playback plus a one second buffer,
/// never less than five seconds.
pub fn display_duration_secs(clip_secs: f64, repetitions: u32) -> f64 {
    (clip_secs * f64::from(repetitions) + 1.0).max(MIN_DISPLAY_SECS)
}

/// Hands fired alerts to independent playback and display units.
///
/// Every `dispatch` spawns its own pair of blocking tasks and keeps no handle
/// to them, so concurrent alerts never wait on each other or on the caller.
#[derive(Clone)]
pub struct AlertDispatcher {
    player: Arc<dyn TonePlayer>,
    display: Arc<dyn BannerDisplay>,
    runtime: Handle,
}

impl AlertDispatcher {
    pub fn new(
        player: Arc<dyn TonePlayer>,
        display: Arc<dyn BannerDisplay>,
        runtime: Handle,
    ) -> Self {
        Self {
            player,
            display,
            runtime,
        }
    }

    /// Schedules playback and display for `notification` and returns immediately.
    pub fn dispatch(&self, notification: Notification) {
        debug!(alert = %notification.key, "Dispatching alert.");

        let player = Arc::clone(&self.player);
        let clip = notification.clip.clone();
        let repetitions = notification.repetitions.max(1);
        let key = notification.key.clone();
        self.runtime.spawn_blocking(move || {
            for round in 1..=repetitions {
                if let Err(e) = player.play(&clip) {
                    warn!(alert = %key, round, error = %e, "Playback failed.");
                    break;
                }
            }
        });

        let display = Arc::clone(&self.display);
        self.runtime.spawn_blocking(move || {
            let clip_secs = clip_duration_or_fallback(&notification.clip);
            let seconds = display_duration_secs(clip_secs, repetitions);
            let request = BannerRequest {
                text: notification.text,
                frame_thickness: notification.frame_thickness,
                banner_color: notification.banner_color,
                text_color: notification.text_color,
                font: notification.font,
                opacity: BANNER_OPACITY,
                duration: Duration::from_secs_f64(seconds),
            };
            display.show(&request);
        });
    }
}
