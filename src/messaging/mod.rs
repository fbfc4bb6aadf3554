//! User-facing terminal output.
//!
//! Progress lines go to stdout with a color per severity. Diagnostics belong
//! in `tracing`, not here.

mod style;

pub use style::RenderStyle;

use nu_ansi_term::Color;

/// Print a plain line.
pub fn info(msg: impl AsRef<str>) {
    println!("{}", msg.as_ref());
}

/// Print a success line.
pub fn success(msg: impl AsRef<str>) {
    println!("{}", RenderStyle::current().success.paint(msg.as_ref()));
}

/// Print a warning line.
pub fn warning(msg: impl AsRef<str>) {
    println!("{}", RenderStyle::current().warning.paint(msg.as_ref()));
}

/// Print a failure line.
pub fn failure(msg: impl AsRef<str>) {
    println!("{}", RenderStyle::current().error.paint(msg.as_ref()));
}

/// Print a bold section heading preceded by a blank line.
pub fn heading(msg: impl AsRef<str>) {
    println!("\n{}", Color::Default.bold().paint(msg.as_ref()));
}
