//! Terminal styling for human-readable output.
//!
//! Colors are applied only when the terminal supports them; otherwise every
//! helper returns the plain text.

use std::env;

use owo_colors::OwoColorize;

// ---------------------------------------------------------------------------
// Palette
// ---------------------------------------------------------------------------

pub const PASS: (u8, u8, u8) = (134, 184, 107);
pub const WARN: (u8, u8, u8) = (229, 192, 123);
pub const FAIL: (u8, u8, u8) = (224, 108, 117);
pub const MUTED: (u8, u8, u8) = (128, 128, 128);
pub const ACCENT: (u8, u8, u8) = (97, 175, 239);

/// Determines if ANSI color codes should be used.
///
/// Respects `NO_COLOR`, `CLICOLOR=0`, `TERM=dumb` and `CLICOLOR_FORCE`,
/// then falls back to TTY detection.
pub fn supports_color() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if env::var("CLICOLOR").as_deref() == Ok("0") {
        return false;
    }
    if env::var("TERM").as_deref() == Ok("dumb") {
        return false;
    }
    if env::var_os("CLICOLOR_FORCE").is_some() {
        return true;
    }
    is_tty()
}

/// Returns `true` if stdout is connected to a terminal.
pub fn is_tty() -> bool {
    crossterm::tty::IsTty::is_tty(&std::io::stdout())
}

fn paint(s: &str, rgb: (u8, u8, u8), enabled: bool) -> String {
    if enabled {
        s.truecolor(rgb.0, rgb.1, rgb.2).to_string()
    } else {
        s.to_string()
    }
}

fn color_str(s: &str, rgb: (u8, u8, u8)) -> String {
    paint(s, rgb, supports_color())
}

pub fn render_pass(s: &str) -> String {
    color_str(s, PASS)
}

pub fn render_warn(s: &str) -> String {
    color_str(s, WARN)
}

pub fn render_fail(s: &str) -> String {
    color_str(s, FAIL)
}

pub fn render_muted(s: &str) -> String {
    color_str(s, MUTED)
}

pub fn render_accent(s: &str) -> String {
    color_str(s, ACCENT)
}

/// Renders a section header in uppercase with accent color and bold.
pub fn render_category(s: &str) -> String {
    let upper = s.to_uppercase();
    if supports_color() {
        upper.truecolor(ACCENT.0, ACCENT.1, ACCENT.2).bold().to_string()
    } else {
        upper
    }
}
