//! Stock tone players and banner displays.
//!
//! The real overlay lives outside this crate. `LogBanner` and `SilentTonePlayer`
//! keep the daemon useful on headless hosts: they log what would be shown or
//! played and hold for as long as the real thing would take, so timing and
//! sequencing behave the same. Enable the `audio` feature for `RodioTonePlayer`.

use crate::dispatch::{clip_duration_or_fallback, BannerDisplay, BannerRequest, TonePlayer};
use crate::error::Result;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Logs each clip and sleeps for its length instead of playing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentTonePlayer;

impl TonePlayer for SilentTonePlayer {
    fn play(&self, clip: &Path) -> Result<()> {
        let secs = clip_duration_or_fallback(clip);
        info!(clip = %clip.display(), secs, "Playing clip (silent).");
        std::thread::sleep(Duration::from_secs_f64(secs));
        Ok(())
    }
}

/// Logs each banner and holds until it would have retired.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogBanner;

impl BannerDisplay for LogBanner {
    fn show(&self, request: &BannerRequest) {
        info!(
            text = %request.text,
            banner = %request.banner_color,
            color = %request.text_color,
            font = %format!("{} {} {}", request.font.family, request.font.size, request.font.weight),
            frame = request.frame_thickness,
            secs = request.duration.as_secs_f64(),
            "Showing banner."
        );
        std::thread::sleep(request.duration);
    }
}

#[cfg(feature = "audio")]
pub use rodio_player::RodioTonePlayer;

#[cfg(feature = "audio")]
mod rodio_player {
    use crate::dispatch::TonePlayer;
    use crate::error::{BellError, Result};
    use rodio::{Decoder, OutputStream, Sink};
    use std::fs::File;
    use std::io::BufReader;
    use std::path::Path;

    /// Plays clips on the default output device.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct RodioTonePlayer;

    impl TonePlayer for RodioTonePlayer {
        fn play(&self, clip: &Path) -> Result<()> {
            let (_stream, handle) =
                OutputStream::try_default().map_err(|e| BellError::clip(clip, e))?;
            let sink = Sink::try_new(&handle).map_err(|e| BellError::clip(clip, e))?;
            let file = File::open(clip).map_err(|e| BellError::clip(clip, e))?;
            let source = Decoder::new(BufReader::new(file)).map_err(|e| BellError::clip(clip, e))?;
            sink.append(source);
            sink.sleep_until_end();
            Ok(())
        }
    }
}
