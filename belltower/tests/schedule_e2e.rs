use belltower::prelude::*;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

const HEADER: &str = r#"
    "sounds": {"start": "start.wav", "start_repetition": 2, "before_end": "warn.wav", "end": "end.wav"},
    "banner": {"frame_thickness": 10},
    "message_settings": {
        "font_family": "Arial", "font_size": 24, "font_weight": "bold",
        "color_start": "white", "color_before_end": "black", "color_end": "white",
        "banner_start": "green", "banner_before_end": "yellow", "banner_end": "red"
    }"#;

const MATH: &str = r#"{"name":"Math","start":"09:00","end":"10:00","alerts":{"start":true,"before_end":10,"end":true}}"#;
const ART: &str = r#"{"name":"Art","start":"11:00","end":"12:00","alerts":{"start":true}}"#;

fn document(monday: &[&str]) -> String {
    format!(
        "{{{HEADER}, \"schedule\": {{\"Monday\": [{}]}}}}",
        monday.join(",")
    )
}

fn write_config(path: &Path, contents: &str, bump_secs: u64) {
    std::fs::write(path, contents).unwrap();
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(bump_secs))
        .unwrap();
}

/// 2024-01-01 is a Monday.
fn monday_at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

struct ScriptedClock(Mutex<NaiveDateTime>);

impl Clock for ScriptedClock {
    fn now(&self) -> Result<NaiveDateTime> {
        Ok(*self.0.lock().unwrap())
    }
}

struct RecordingPlayer(UnboundedSender<PathBuf>);

impl TonePlayer for RecordingPlayer {
    fn play(&self, clip: &Path) -> Result<()> {
        self.0.send(clip.to_path_buf()).ok();
        Ok(())
    }
}

struct RecordingBanner(UnboundedSender<BannerRequest>);

impl BannerDisplay for RecordingBanner {
    fn show(&self, request: &BannerRequest) {
        self.0.send(request.clone()).ok();
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    config_path: PathBuf,
    clock: Arc<ScriptedClock>,
    engine: TriggerEngine,
    plays: UnboundedReceiver<PathBuf>,
    banners: UnboundedReceiver<BannerRequest>,
}

impl Harness {
    fn new(contents: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        write_config(&config_path, contents, 0);

        let (play_tx, plays) = unbounded_channel();
        let (banner_tx, banners) = unbounded_channel();
        let dispatcher = AlertDispatcher::new(
            Arc::new(RecordingPlayer(play_tx)),
            Arc::new(RecordingBanner(banner_tx)),
            Handle::current(),
        );
        let clock = Arc::new(ScriptedClock(Mutex::new(monday_at(0, 0, 0))));
        let engine = TriggerEngine::new(ConfigWatcher::open(&config_path, dir.path()), dispatcher)
            .with_clock(clock.clone());
        Self {
            _dir: dir,
            config_path,
            clock,
            engine,
            plays,
            banners,
        }
    }

    fn tick_at(&mut self, at: NaiveDateTime) -> Vec<TriggerKey> {
        *self.clock.0.lock().unwrap() = at;
        self.engine.tick().unwrap()
    }
}

async fn next<T>(rx: &mut UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for dispatch")
        .expect("channel closed")
}

#[tokio::test]
async fn fires_each_boundary_exactly_once() {
    let mut harness = Harness::new(&document(&[MATH]));
    let minutes = [
        (8, 59),
        (9, 0),
        (9, 1),
        (9, 49),
        (9, 50),
        (9, 51),
        (9, 59),
        (10, 0),
        (10, 1),
    ];

    let mut fired = Vec::new();
    for (h, m) in minutes {
        // Three samples per minute, like the 20 second cadence.
        for s in [0, 20, 40] {
            for key in harness.tick_at(monday_at(h, m, s)) {
                fired.push(((h, m), key.event, key.kind));
            }
        }
    }

    assert_eq!(
        fired,
        [
            ((9, 0), "Math".to_string(), AlertKind::Start),
            ((9, 50), "Math".to_string(), AlertKind::BeforeEnd),
            ((10, 0), "Math".to_string(), AlertKind::End),
        ]
    );
}

#[tokio::test]
async fn fired_alert_reaches_player_and_banner() {
    let mut harness = Harness::new(&document(&[MATH]));
    assert_eq!(harness.tick_at(monday_at(9, 0, 7)).len(), 1);

    // start_repetition is 2.
    let first = next(&mut harness.plays).await;
    let second = next(&mut harness.plays).await;
    assert_eq!(first, second);
    assert!(first.ends_with("start.wav"));

    let banner = next(&mut harness.banners).await;
    assert_eq!(banner.text, "🔔 Math starts now!");
    assert_eq!(banner.banner_color, "green");
    assert_eq!(banner.frame_thickness, 10);
    // Unreadable clip: 2s fallback twice plus the buffer.
    assert_eq!(banner.duration, Duration::from_secs(5));
}

#[tokio::test]
async fn reload_adds_events_and_bad_edits_are_ignored() {
    let mut harness = Harness::new(&document(&[MATH]));
    let mut system = harness.engine.subscribe_system_events();
    assert!(harness.tick_at(monday_at(11, 0, 0)).is_empty());

    write_config(&harness.config_path, &document(&[MATH, ART]), 10);
    let keys = harness.tick_at(monday_at(11, 0, 20));
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].event, "Art");

    write_config(&harness.config_path, "{\"sounds\": ", 20);
    assert!(harness.tick_at(monday_at(11, 0, 40)).is_empty());
    assert_eq!(
        harness.engine.current_config().events_on(chrono::Weekday::Mon).len(),
        2
    );

    let mut reloaded = 0;
    let mut failed = 0;
    while let Ok(event) = system.try_recv() {
        match event {
            SystemEvent::ConfigReloaded { events, .. } => {
                assert_eq!(events, 2);
                reloaded += 1;
            }
            SystemEvent::ConfigReloadFailed { .. } => failed += 1,
            _ => {}
        }
    }
    assert_eq!((reloaded, failed), (1, 1));
}
