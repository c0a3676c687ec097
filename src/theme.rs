//! Color themes for the d2x page
//!
//! Selected with `--theme`; every section of the page draws from one `Palette`.

use ratatui::style::Color;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    /// Muted modern colors (default)
    #[default]
    Nord,
    /// Orange on black
    AmberCrt,
    /// Green on black
    GreenPhosphor,
}

impl Theme {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "nord" => Ok(Theme::Nord),
            "amber" | "ambercrt" | "amber-crt" => Ok(Theme::AmberCrt),
            "green" | "greenphosphor" | "green-phosphor" => Ok(Theme::GreenPhosphor),
            _ => Err(format!(
                "Unknown theme '{s}'. Available: nord, amber-crt, green-phosphor"
            )),
        }
    }

    pub fn palette(&self) -> Palette {
        match self {
            Theme::Nord => Palette::nord(),
            Theme::AmberCrt => Palette::amber_crt(),
            Theme::GreenPhosphor => Palette::green_phosphor(),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Nord => write!(f, "nord"),
            Theme::AmberCrt => write!(f, "amber-crt"),
            Theme::GreenPhosphor => write!(f, "green-phosphor"),
        }
    }
}

/// Colors for each kind of line on the page
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub background: Color,
    pub text: Color,
    /// Secondary info and hints
    pub text_dim: Color,
    /// h2/h3 section titles
    pub heading: Color,
    /// Item, season and user names pulled from the API
    pub highlight: Color,
    /// URLs and inline code
    pub code: Color,
    /// Loading placeholders
    pub pending: Color,
    pub error: Color,
    pub border: Color,
    pub debug_indicator: Color,
}

impl Palette {
    pub fn nord() -> Self {
        Self {
            background: Color::Black,
            text: Color::White,
            text_dim: Color::Gray,
            heading: Color::Cyan,
            highlight: Color::Yellow,
            code: Color::LightBlue,
            pending: Color::DarkGray,
            error: Color::Red,
            border: Color::Gray,
            debug_indicator: Color::Magenta,
        }
    }

    pub fn amber_crt() -> Self {
        let amber = Color::Rgb(255, 176, 0);
        let amber_bright = Color::Rgb(255, 200, 100);
        let amber_dim = Color::Rgb(180, 120, 0);

        Self {
            background: Color::Black,
            text: amber,
            text_dim: amber_dim,
            heading: amber_bright,
            highlight: amber_bright,
            code: amber,
            pending: amber_dim,
            error: Color::Red,
            border: amber_dim,
            debug_indicator: Color::Rgb(255, 100, 255),
        }
    }

    pub fn green_phosphor() -> Self {
        let green = Color::Rgb(0, 255, 0);
        let green_dim = Color::Rgb(0, 180, 0);
        let green_bright = Color::Rgb(100, 255, 100);

        Self {
            background: Color::Black,
            text: green,
            text_dim: green_dim,
            heading: green_bright,
            highlight: green_bright,
            code: green,
            pending: green_dim,
            error: Color::Red,
            border: green_dim,
            debug_indicator: Color::Cyan,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::nord()
    }
}
