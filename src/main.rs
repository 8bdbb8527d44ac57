//! Connects to an X display and prints the toolkit events translated from
//! what the server sends

#![deny(
    clippy::all,
    clippy::correctness,
    clippy::perf,
    clippy::style,
    absolute_paths_not_starting_with_crate,
    anonymous_parameters,
    bad_style,
    keyword_idents,
    non_shorthand_field_patterns,
    overflowing_literals,
    unconditional_recursion,
    unsafe_code,
    while_true
)]
#![allow(clippy::redundant_pub_crate)]

mod cli;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use itertools::Itertools;
use xdpy::{
    config::Config,
    core::WindowKind,
    geometry::Rectangle,
    xdpy_error,
    xdpy_info,
    Display,
    Event,
    EventKind,
    EventMask,
    WindowId,
};

use crate::cli::Opts;

/// Size of the window created by `--window`
const DEMO_WINDOW: Rectangle = Rectangle::new(0, 0, 400, 300);

fn main() -> Result<()> {
    let args = Opts::parse();

    match args.color_when.as_deref() {
        Some("never") => colored::control::set_override(false),
        Some("always") => colored::control::set_override(true),
        _ => {},
    }

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    apply_args(&mut config, &args);

    let (_logger, log_dir) = utils::initialize_logging(&config, &args)?;
    log::debug!("{}: {:#?}", "Configuration options".bright_blue(), config);
    if config.logging.log_to_file {
        log::info!("logging to {}", log_dir.display());
    }

    let settings = config.display.clone().with_env();
    let mut display = Display::connect(settings).context("failed to open the display")?;

    let root = display.screen().root_id();
    display.select_window_events(root, EventMask::STRUCTURE | EventMask::PROPERTY_CHANGE)?;

    let window = if args.window {
        let id = display.create_window(WindowKind::Toplevel, None, DEMO_WINDOW)?;
        let mask = display.handled_events();
        display.select_window_events(id, mask)?;
        display.show(id)?;
        Some(id)
    } else {
        None
    };
    display.notify_startup_complete(None)?;

    let wm_name = display.window_manager_name();
    xdpy_info!(
        "{} screen {} (wm: {}, translators: {})",
        display.name().green(),
        display.screen().number(),
        wm_name.yellow(),
        display.translators().names().join(", ")
    );

    run(&mut display, window, args.max_events)
}

/// Command line flags win over the configuration file
fn apply_args(config: &mut Config, args: &Opts) {
    if let Some(name) = &args.display {
        config.display.display = Some(name.clone());
    }
    if args.sync {
        config.display.synchronize = true;
    }
    if let Some(scale) = args.scale {
        config.display.fixed_window_scale = Some(scale);
    }
}

/// Dispatch until the display closes, the window is deleted or enough events
/// were printed
fn run(display: &mut Display, window: Option<WindowId>, max_events: Option<usize>) -> Result<()> {
    let mut printed = 0_usize;

    while !display.is_closed() {
        display.dispatch(-1)?;

        while let Some(event) = display.next_event() {
            print_event(display, &event);
            printed += 1;

            if window.is_some() && event.window == window {
                match event.kind {
                    EventKind::Delete => {
                        if let Some(id) = window {
                            display.destroy_window(id)?;
                        }
                        display.flush()?;
                        return Ok(());
                    },
                    EventKind::Configure { .. } | EventKind::Map => {
                        // Nothing is drawn, but the window manager still
                        // waits for the frame to complete
                        if let Some(id) = window {
                            if display.begin_frame(id)? {
                                display.end_frame(id)?;
                            }
                        }
                    },
                    _ => {},
                }
            }

            if max_events.map_or(false, |max| printed >= max) {
                return Ok(());
            }
        }
    }

    xdpy_error!("the connection to {} was lost", display.name());
    Ok(())
}

fn print_event(display: &Display, event: &Event) {
    let window = event
        .window
        .and_then(|id| display.window(id))
        .map_or_else(|| String::from("-"), |r| format!("0x{:x}", r.xid));

    let detail = match &event.kind {
        EventKind::WindowState { changed, new_state } => format!(
            "window-state changed=[{}] new=[{}]",
            changed.describe(),
            new_state.describe()
        ),
        kind => kind.to_string(),
    };

    println!(
        "{:>8} {} {}{}",
        event.serial.to_string().bright_black(),
        window.cyan(),
        detail,
        if event.send_event { " (sent)".purple().to_string() } else { String::new() }
    );
}
