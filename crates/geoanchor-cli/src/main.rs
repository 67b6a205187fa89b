//! `geoanchor` – simulated localization run.
//!
//! 1. Loads `~/.geoanchor/config.toml`, writing the defaults on first run.
//! 2. Wires a simulated camera, localizer and alignment service into a
//!    [`LocalizeLoop`].
//! 3. Fetches the map's alignment record, then runs the configured number of
//!    attempts, printing the anchor, the camera's position and heading, and
//!    the success label after each one.
//! 4. Ctrl-C stops the run after the attempt in progress.

mod config;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use colored::Colorize;
use geoanchor_hal::sim::{
    SimCamera, SimLocalizer, StaticAlignmentSource, Wgs84Geodesy, level_camera_rotation,
};
use geoanchor_perception::Vec3;
use geoanchor_runtime::{LocalizeLoop, LogFormat, TickReport, init_tracing};
use geoanchor_types::{LocError, Wgs84};
use tracing::{info, warn};

use config::Config;

fn main() -> ExitCode {
    let (cfg, config_note) = match config::load() {
        Ok(Some(cfg)) => (cfg, None),
        Ok(None) => first_run(),
        Err(e) => {
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            (cfg, Some(format!("{}: {e}; using defaults", "Config error".red())))
        }
    };

    let _guard = init_tracing("geoanchor", LogFormat::from_env().unwrap_or(cfg.log_format));

    print_banner();
    if let Some(note) = config_note {
        println!("  {note}");
    }
    info!(?cfg, "configuration loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – stopping after the current attempt …"
                .yellow()
                .bold()
        );
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {e}", "Failed to start async runtime".red());
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&cfg, shutdown)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "Run aborted".red().bold());
            ExitCode::FAILURE
        }
    }
}

/// Write the defaults so the user has a file to edit.
fn first_run() -> (Config, Option<String>) {
    let mut cfg = Config::default();
    let note = match config::save(&cfg) {
        Ok(()) => format!(
            "{} Wrote default config to {}",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => format!("{}: {e}", "Error saving config".red()),
    };
    config::apply_env_overrides(&mut cfg);
    (cfg, Some(note))
}

async fn run(cfg: &Config, shutdown: Arc<AtomicBool>) -> Result<(), LocError> {
    let sim = &cfg.sim;
    let origin = Wgs84::new(sim.latitude, sim.longitude, sim.altitude);
    let alignment = StaticAlignmentSource::new()
        .with_record(cfg.map_id, Wgs84Geodesy::enu_aligned_record(origin, 1.0)?);
    let localizer = SimLocalizer::new(0, Vec3::zero(), level_camera_rotation(sim.yaw_deg))
        .with_pattern(sim.success_pattern.clone())
        .with_spin(sim.spin_deg)
        .with_latency(Duration::from_millis(sim.latency_ms));

    let mut lp = LocalizeLoop::new(
        Box::new(SimCamera::new("sim_rear")),
        Box::new(localizer),
        Arc::new(alignment),
        Arc::new(Wgs84Geodesy::new()),
    );

    println!(
        "  Map {} on camera {}",
        cfg.map_id.to_string().bold(),
        lp.camera_id().bold()
    );
    match lp.load_map(cfg.map_id, &cfg.token).await {
        Ok(true) => println!("  {} alignment record loaded", "✓".green().bold()),
        Ok(false) => println!("  {}", "map has no alignment; headings unavailable".yellow()),
        Err(e) => {
            println!("  {} {e}", "alignment fetch failed:".yellow());
            if cfg.token.is_empty() {
                println!("  Set {} to enable headings.", "GEOANCHOR_TOKEN".bold());
            }
        }
    }
    println!();

    let mut ticker = tokio::time::interval(Duration::from_millis(cfg.interval_ms.max(1)));
    for attempt in 1..=cfg.attempts {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        ticker.tick().await;
        match lp.tick().await {
            Ok(report) => print_report(attempt, &report),
            Err(e) => println!("  [{attempt:>3}] {} {e}", "engine fault".red()),
        }
        println!("        {}", lp.session().summary().bold());
    }

    println!();
    println!("  {}", lp.session().summary().bold().cyan());
    Ok(())
}

fn print_report(attempt: u32, report: &TickReport) {
    match &report.anchor {
        Ok(anchor) => {
            let t = anchor.translation();
            println!(
                "  [{attempt:>3}] {} anchor ({:.3}, {:.3}, {:.3}) confidence {}",
                "localized".green().bold(),
                t.x,
                t.y,
                t.z,
                report.result.confidence
            );
        }
        Err(LocError::NoLocalization) => {
            println!("  [{attempt:>3}] {}", "no match".yellow());
        }
        Err(e) => println!("  [{attempt:>3}] {} {e}", "pose rejected".red()),
    }
    match &report.heading {
        Ok(h) => println!(
            "        lat {:.6}  lon {:.6}  alt {:.1} m  heading {:.1}°",
            h.position.latitude, h.position.longitude, h.position.altitude, h.heading_deg
        ),
        Err(e) => println!("        {}", format!("heading unavailable: {e}").dimmed()),
    }
}

fn print_banner() {
    println!();
    println!("  {} {}", "geoanchor".bold().cyan(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Visual localization with compass heading (simulated device)");
    println!();
}
