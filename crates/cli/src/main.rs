//! playhead CLI: play an audio file with a progress line and level meters.
//!
//! Usage:
//!   playhead <file> [--loop] [--seek SECONDS] [--offline]
//!
//! `--offline` renders through a manual clock as fast as possible instead of
//! the default output device.

use playhead::{
    create_offline_player, create_player_with_config, format_time, AudioError, AudioPlayer,
    ManualClock, PlayerConfig, PlayerObserver,
};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

const METER_CHANNELS: usize = 2;
const OFFLINE_TICK_FRAMES: usize = 1024;

struct Options {
    path: String,
    looping: bool,
    seek: Option<f64>,
    offline: bool,
}

/// Peak levels since the last progress line, and whether the file ended
#[derive(Default)]
struct Meter {
    peaks: [AtomicU32; METER_CHANNELS],
    finished: AtomicBool,
}

impl Meter {
    /// Read and reset the peaks
    fn take_peaks(&self) -> [f32; METER_CHANNELS] {
        let mut out = [0.0; METER_CHANNELS];
        for (peak, slot) in out.iter_mut().zip(self.peaks.iter()) {
            *peak = f32::from_bits(slot.swap(0, Ordering::Relaxed));
        }
        out
    }
}

impl PlayerObserver for Meter {
    fn on_end_of_file(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }

    fn on_samples(&self, buffers: &[&[f32]], _frames: usize, _channels: usize) {
        for (ch, buffer) in buffers.iter().enumerate() {
            let slot = &self.peaks[ch.min(METER_CHANNELS - 1)];
            let peak = buffer.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            let current = f32::from_bits(slot.load(Ordering::Relaxed));
            if peak > current {
                slot.store(peak.to_bits(), Ordering::Relaxed);
            }
        }
    }

    fn on_error(&self, error: &AudioError) {
        log::warn!("Playback error: {}", error);
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = match parse_args(std::env::args().skip(1).collect()) {
        Some(options) => options,
        None => {
            print_usage();
            std::process::exit(2);
        }
    };

    if let Err(e) = run(&options) {
        eprintln!("playhead: {}", e);
        std::process::exit(1);
    }
}

fn parse_args(args: Vec<String>) -> Option<Options> {
    let mut path = None;
    let mut looping = false;
    let mut seek = None;
    let mut offline = false;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--loop" => looping = true,
            "--offline" => offline = true,
            "--seek" => match iter.next().and_then(|s| s.parse::<f64>().ok()) {
                Some(seconds) => seek = Some(seconds),
                None => {
                    eprintln!("--seek needs a number of seconds");
                    return None;
                }
            },
            "-h" | "--help" => return None,
            other if other.starts_with('-') => {
                eprintln!("unknown option: {}", other);
                return None;
            }
            other => path = Some(other.to_string()),
        }
    }

    Some(Options {
        path: path?,
        looping,
        seek,
        offline,
    })
}

fn run(options: &Options) -> playhead::Result<()> {
    let config = PlayerConfig::default();
    let (mut player, clock) = if options.offline {
        let (player, clock) = create_offline_player(config);
        (player, Some(clock))
    } else {
        (create_player_with_config(config), None)
    };

    let meter = Arc::new(Meter::default());
    player.subscribe(&meter);

    player.set_should_loop(options.looping);
    player.load_file(&options.path)?;
    if let Some(seconds) = options.seek {
        player.set_current_time(seconds)?;
    }
    player.play()?;

    match clock {
        Some(clock) => render_offline(&mut player, &clock, &meter),
        None => follow_device(&player, &meter),
    }

    player.release()?;
    println!();
    Ok(())
}

fn follow_device(player: &AudioPlayer, meter: &Meter) {
    while !player.is_end_of_file() && !meter.finished.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(250));
        print_progress(player, meter);
    }
}

/// Render one pass of the file; with looping on, stop after one duration
fn render_offline(player: &mut AudioPlayer, clock: &ManualClock, meter: &Meter) {
    let budget = player.total_frames().saturating_sub(player.frame_index());
    let mut rendered = 0u64;
    let mut ticks = 0u64;

    while !player.is_end_of_file() && rendered < budget {
        clock.tick(OFFLINE_TICK_FRAMES);
        rendered += OFFLINE_TICK_FRAMES as u64;
        ticks += 1;
        if ticks % 64 == 0 {
            print_progress(player, meter);
        }
    }
    print_progress(player, meter);

    if let Err(e) = player.pause() {
        log::warn!("Failed to pause: {}", e);
    }
}

fn print_progress(player: &AudioPlayer, meter: &Meter) {
    let bar_width = 30;
    let duration = player.duration();
    let filled = if duration > 0.0 {
        ((player.current_time() / duration) * bar_width as f64) as usize
    } else {
        0
    };
    let filled = filled.min(bar_width);
    let [left, right] = meter.take_peaks();

    print!(
        "\r  [{}{}] {} / {}  L {} R {}  ",
        "=".repeat(filled),
        " ".repeat(bar_width - filled),
        player.formatted_current_time(),
        format_time(duration),
        level_bar(left),
        level_bar(right),
    );
    std::io::stdout().flush().ok();
}

fn level_bar(peak: f32) -> String {
    let width = 10;
    let lit = ((peak.clamp(0.0, 1.0)) * width as f32).round() as usize;
    format!("{}{}", "#".repeat(lit), ".".repeat(width - lit))
}

fn print_usage() {
    println!("playhead - play an audio file");
    println!();
    println!("usage: playhead <file> [options]");
    println!();
    println!("options:");
    println!("  --loop             Loop the file");
    println!("  --seek <seconds>   Start at the given time");
    println!("  --offline          Render without an output device");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let options = parse_args(args(&["song.flac", "--loop", "--seek", "12.5"])).unwrap();
        assert_eq!(options.path, "song.flac");
        assert!(options.looping);
        assert_eq!(options.seek, Some(12.5));
        assert!(!options.offline);
    }

    #[test]
    fn test_parse_args_rejects_bad_input() {
        assert!(parse_args(args(&[])).is_none());
        assert!(parse_args(args(&["a.wav", "--seek", "soon"])).is_none());
        assert!(parse_args(args(&["a.wav", "--volume"])).is_none());
    }

    #[test]
    fn test_level_bar() {
        assert_eq!(level_bar(0.0), "..........");
        assert_eq!(level_bar(0.5), "#####.....");
        assert_eq!(level_bar(3.0), "##########");
    }
}
