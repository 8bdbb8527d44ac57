//! The X11 display core of a toolkit: one connection to the server, error
//! traps, translation of wire events into toolkit events, and the toplevel
//! state the window manager publishes

#![deny(
    clippy::all,
    clippy::correctness,
    clippy::perf,
    clippy::style,
    absolute_paths_not_starting_with_crate,
    anonymous_parameters,
    bad_style,
    ellipsis_inclusive_range_patterns,
    exported_private_dependencies,
    ill_formed_attribute_input,
    improper_ctypes,
    keyword_idents,
    macro_use_extern_crate,
    meta_variable_misuse,
    missing_abi,
    no_mangle_generic_items,
    non_shorthand_field_patterns,
    noop_method_call,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    semicolon_in_expressions_from_macros,
    unconditional_recursion,
    unsafe_code,
    while_true
)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless,
    clippy::module_name_repetitions,
    clippy::new_without_default,
    clippy::redundant_pub_crate,
    clippy::struct_excessive_bools,
    clippy::too_many_lines
)]
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::panic,
        clippy::unwrap_used,
        clippy::wildcard_enum_match_arm,
    )
)]

#[macro_use]
pub mod macros;

pub mod config;
pub mod core;
pub mod display;
pub mod error;
pub mod error_trap;
pub mod event;
pub mod event_source;
pub mod frame_clock;
pub mod geometry;
pub mod keymap;
pub mod protocols;
pub mod screen;
pub mod selection;
pub mod server_time;
pub mod startup;
pub mod toplevel;
pub mod translate;
pub mod translator;
pub mod window;

/// X protocol plumbing: atoms, wire events, properties and the transport
pub mod x {
    pub mod atoms;
    pub mod connection;
    pub mod event;
    pub mod property;
    pub mod transport;
}

#[cfg(test)]
mod testing;

pub use crate::{
    config::{Config, DisplaySettings},
    display::Display,
    error::{Error, Result},
    event::{Event, EventKind, EventMask},
    protocols::{Filter, FilterReturn},
    toplevel::WindowState,
    translator::EventTranslator,
    window::WindowId,
};
