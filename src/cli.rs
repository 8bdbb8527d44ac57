//! The command line arguments

use crate::utils::wants_color;
use clap::{crate_description, crate_version, AppSettings, Parser, ValueHint};
use once_cell::sync::Lazy;
use std::{env, fs, path::PathBuf};

/// Options for the [`xdpy`] program
#[derive(Parser, Default, Clone, Debug, PartialEq)]
#[clap(
    version = crate_version!(),
    about = <String as AsRef<str>>::as_ref(&APP_ABOUT),
    after_help =  <String as AsRef<str>>::as_ref(&AFTER_HELP),
    override_usage =  <String as AsRef<str>>::as_ref(&OVERRIDE_HELP),
    max_term_width = 100,
    color = clap::ColorChoice::Auto,
    global_setting = AppSettings::DeriveDisplayOrder,
    disable_help_subcommand = true,
    hide_possible_values = true,
)]
pub(crate) struct Opts {
    /// Display debugging messages on various levels
    #[clap(
        long,
        short,
        global = true,
        parse(from_occurrences),
        long_help = "
        Set the verbosity level of the program. There are 2 extra levels after the default (INFO). \
                     If `-v` is used, DEBUG messages are displayed, and if `-vv` is used TRACE \
                     messages are displayed. The verbosity can also be set with the `XDPY_LOG` \
                     environment variable"
    )]
    pub(crate) verbose: u8,

    /// Location of configuration file
    #[clap(
        long,
        short,
        takes_value = true,
        number_of_values = 1,
        value_name = "file",
        value_hint = ValueHint::FilePath,
        validator = |t| {
            fs::metadata(
                PathBuf::from(t).components()
                    .count()
                    .gt(&1_usize)
                    .then(|| PathBuf::from(t))
                    .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(PathBuf::from(t))),
            )
            .map(|_| ())
            .map_err(|_| String::from("must be a valid path"))
        },
        long_help = "\
        Specify the location of the configuration file. The default location is \
                `$XDG_CONFIG_HOME/xdpy/xdpy.yml`"
    )]
    pub(crate) config: Option<PathBuf>,

    /// X display to connect to
    #[clap(
        long,
        short = 'D',
        takes_value = true,
        value_name = "name",
        long_help = "\
        Name of the X display to connect to, e.g. `:1`. Overrides the configuration file; the \
                     default is the value of `$DISPLAY`"
    )]
    pub(crate) display: Option<String>,

    /// Process every request synchronously
    #[clap(
        long,
        short,
        takes_value = false,
        long_help = "\
        Wait for the server to process each request before sending the next one. Protocol \
                     errors are then reported right at the request that caused them"
    )]
    pub(crate) sync: bool,

    /// Force a window scale
    #[clap(
        long,
        takes_value = true,
        value_name = "n",
        validator = |s| s.parse::<i32>().map(|_| ()).map_err(|e| e.to_string()),
    )]
    pub(crate) scale: Option<i32>,

    /// Create and map a toplevel window to watch the window manager talk to
    #[clap(long, short, takes_value = false)]
    pub(crate) window: bool,

    /// Exit after printing this many events
    #[clap(
        long,
        short = 'n',
        takes_value = true,
        value_name = "count",
        validator = |s| s.parse::<usize>().map(|_| ()).map_err(|e| e.to_string()),
    )]
    pub(crate) max_events: Option<usize>,

    /// When to colorize output
    #[clap(
        name = "color",
        long = "color",
        short = 'C',
        value_name = "when",
        possible_values = &["never", "auto", "always"],
        long_help = "\
        When to colorize output (usually meant for piping). Valid values are: always, \
                auto, never."
    )]
    pub(crate) color_when: Option<String>,
}

// =============== Prettify Help ==================

/// Yellow ansi code
const YELLOW: &str = "\x1b[0;33m";
/// Green ansi code
const GREEN: &str = "\x1b[0;32m";
/// Bold-red ansi code
const BRED: &str = "\x1b[01;38;5;1m";
/// Reset colors
const RES: &str = "\x1b[0m";

/// Colored options used in the output of `--help`
pub(crate) static APP_ABOUT: Lazy<String> = Lazy::new(|| {
    wants_color()
        .then(|| {
            format!(
                "{}DESCRIPTION: {}{}{}",
                YELLOW,
                GREEN,
                crate_description!(),
                RES
            )
        })
        .unwrap_or_else(|| crate_description!().to_owned())
});

/// Colorized message to override the generated help message
pub(crate) static OVERRIDE_HELP: Lazy<String> = Lazy::new(|| {
    wants_color()
        .then(|| {
            format!(
                "{}xdpy{} [{}FLAGS{}/{}OPTIONS{}]",
                BRED, RES, GREEN, RES, GREEN, RES
            )
        })
        .unwrap_or_else(|| String::from("xdpy [FLAGS/OPTIONS]"))
});

/// Colorized message displayed after the help message
pub(crate) static AFTER_HELP: Lazy<String> = Lazy::new(|| {
    wants_color()
        .then(|| {
            format!(
                "See {}xdpy{} {}--help{} for longer explanations of some options.",
                BRED, RES, GREEN, RES
            )
        })
        .unwrap_or_else(|| {
            String::from("See xdpy --help for longer explanations of some options.")
        })
});
