//! Macros for error/warning printing

/// Expand to an error message
#[macro_export]
macro_rules! xdpy_error {
    ($($err:tt)*) => ({
        use colored::Colorize;
        eprintln!("{}: {}", "[xdpy error]".red().bold(), format!($($err)*));
    })
}

/// Expand to an info message
#[macro_export]
macro_rules! xdpy_info {
    ($($err:tt)*) => ({
        use colored::Colorize;
        eprintln!("{}: {}", "[xdpy info]".purple().bold(), format!($($err)*));
    })
}

/// Expand to a fatal message. Debug builds panic, release builds exit with 1
#[macro_export]
macro_rules! xdpy_fatal {
    ($($err:tt)*) => ({
        use colored::Colorize;
        let msg = format!($($err)*);
        eprintln!("{}: {}", "[xdpy fatal]".yellow().bold(), msg);
        if cfg!(debug_assertions) {
            panic!("{}", msg);
        }
        std::process::exit(1);
    })
}
