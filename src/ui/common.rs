//! # UI Common Components and Utilities
//!
//! Shared styling for the dashboard window: the chrome colour palette, frame
//! construction and the conversion from the `#rrggbb` strings stored in
//! widget configurations to egui colours.
//!
//! ## Why This Module Exists
//!
//! Widget colours live in layout files as plain hex strings so they stay
//! readable and editable by hand. Everything that paints needs them as
//! [`Color32`], with a sane fallback when a file carries garbage. Keeping
//! that conversion and the toolbar palette in one place keeps the painting
//! code free of parsing details.

use eframe::egui::{self, Color32, Frame, Stroke};

/// Creates a styled frame with the toolbar look
pub fn create_frame(bg_color: Color32, border_color: Color32) -> Frame {
    Frame::new()
        .stroke(Stroke::new(1.0, border_color))
        .fill(bg_color)
        .inner_margin(4)
        .outer_margin(2)
}

/// Colour palette for the application chrome (toolbar, status bar, dialogs).
///
/// Widget colours are not taken from here; they come from each widget's
/// configuration.
pub struct UiColors;

impl UiColors {
    /// Primary background color for main content areas (RGB: 30, 30, 30)
    pub const MAIN_BG: Color32 = Color32::from_rgb(30, 30, 30);

    /// Secondary background color for nested components (RGB: 25, 25, 25)
    pub const INNER_BG: Color32 = Color32::from_rgb(25, 25, 25);

    /// Canvas background in dark theme (RGB: 20, 20, 20)
    pub const EXTREME_BG: Color32 = Color32::from_rgb(20, 20, 20);

    /// Canvas background in light theme
    pub const LIGHT_BG: Color32 = Color32::from_rgb(240, 242, 245);

    /// Border color for component separation (RGB: 60, 60, 60)
    pub const BORDER: Color32 = Color32::from_rgb(60, 60, 60);

    /// Connected status, successful actions
    pub const ACTIVE: Color32 = Color32::from_rgb(50, 200, 20);

    /// Disconnected status, failed actions
    pub const INACTIVE: Color32 = Color32::from_rgb(200, 50, 20);

    /// Grid dots drawn behind widgets while editing
    pub const GRID: Color32 = Color32::from_rgb(90, 90, 90);
}

/// Parses `#rgb`, `#rrggbb` or `#rrggbbaa` (the leading `#` is optional)
pub fn parse_hex_color(text: &str) -> Option<Color32> {
    let hex = text.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();

    match hex.len() {
        3 => {
            let short = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
            Some(Color32::from_rgb(short(0)?, short(1)?, short(2)?))
        }
        6 => Some(Color32::from_rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        8 => Some(Color32::from_rgba_unmultiplied(
            channel(0..2)?,
            channel(2..4)?,
            channel(4..6)?,
            channel(6..8)?,
        )),
        _ => None,
    }
}

/// Like [`parse_hex_color`] but never fails
pub fn color_or(text: &str, fallback: Color32) -> Color32 {
    parse_hex_color(text).unwrap_or(fallback)
}

/// Applies a widget opacity on top of a colour
pub fn faded(color: Color32, opacity: f32) -> Color32 {
    color.gamma_multiply(opacity.clamp(0.0, 1.0))
}

/// Sets the egui theme from the settings' theme name
pub fn apply_theme(ctx: &egui::Context, dark: bool) {
    if dark {
        ctx.set_theme(egui::Theme::Dark);
    } else {
        ctx.set_theme(egui::Theme::Light);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_hex() {
        assert_eq!(parse_hex_color("#0d6efd"), Some(Color32::from_rgb(13, 110, 253)));
        assert_eq!(parse_hex_color("ffffff"), Some(Color32::WHITE));
        assert_eq!(parse_hex_color("#fff"), Some(Color32::WHITE));
        assert_eq!(parse_hex_color(" #000 "), Some(Color32::BLACK));
    }

    #[test]
    fn parses_alpha() {
        let color = parse_hex_color("#ff000080").unwrap();
        assert_eq!(color, Color32::from_rgba_unmultiplied(255, 0, 0, 128));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_hex_color(""), None);
        assert_eq!(parse_hex_color("#12"), None);
        assert_eq!(parse_hex_color("#gggggg"), None);
        assert_eq!(parse_hex_color("#ééé"), None);
        assert_eq!(color_or("red", UiColors::BORDER), UiColors::BORDER);
    }
}
