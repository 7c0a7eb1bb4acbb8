//! Color themes for the TUI.

use crate::log::{LogOrigin, NoticeLevel};
use ratatui::style::Color;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub name: &'static str,

    pub bg: Color,
    pub fg: Color,

    /// Lines reported by the device
    pub device_color: Color,
    /// Controller's own log lines
    pub local_color: Color,
    pub error_color: Color,
    pub success_color: Color,
    pub warning_color: Color,

    pub border: Color,
    pub selection: Color,
    /// Actions that cannot be used in the current state
    pub inactive: Color,
    pub accent: Color,
}

/// The ten base colors a theme is built from, as `0xRRGGBB`.
struct Palette {
    bg: u32,
    fg: u32,
    green: u32,
    blue: u32,
    red: u32,
    yellow: u32,
    border: u32,
    selection: u32,
    muted: u32,
    accent: u32,
}

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

impl Theme {
    const fn from_palette(name: &'static str, p: Palette) -> Self {
        Self {
            name,
            bg: rgb(p.bg),
            fg: rgb(p.fg),
            device_color: rgb(p.green),
            local_color: rgb(p.blue),
            error_color: rgb(p.red),
            success_color: rgb(p.green),
            warning_color: rgb(p.yellow),
            border: rgb(p.border),
            selection: rgb(p.selection),
            inactive: rgb(p.muted),
            accent: rgb(p.accent),
        }
    }

    /// Catppuccin Mocha. The default.
    pub const fn dark() -> Self {
        Self::from_palette(
            "dark",
            Palette {
                bg: 0x1e1e2e,
                fg: 0xcdd6f4,
                green: 0xa6e3a1,
                blue: 0x89b4fa,
                red: 0xf38ba8,
                yellow: 0xf9e2af,
                border: 0x585b70,
                selection: 0x45475a,
                muted: 0x6c7086,
                accent: 0xcba6f7,
            },
        )
    }

    /// Catppuccin Latte.
    pub const fn light() -> Self {
        Self::from_palette(
            "light",
            Palette {
                bg: 0xeff1f5,
                fg: 0x4c4f69,
                green: 0x40a02b,
                blue: 0x1e66f5,
                red: 0xd20f39,
                yellow: 0xdf8e1d,
                border: 0xacb0be,
                selection: 0xccd0da,
                muted: 0x8c8fa1,
                accent: 0x8839ef,
            },
        )
    }

    pub const fn solarized_dark() -> Self {
        Self::from_palette(
            "solarized",
            Palette {
                bg: 0x002b36,
                fg: 0x839496,
                green: 0x859900,
                blue: 0x268bd2,
                red: 0xdc322f,
                yellow: 0xb58900,
                border: 0x586e75,
                selection: 0x073642,
                muted: 0x657b83,
                accent: 0x6c71c4,
            },
        )
    }

    pub const fn dracula() -> Self {
        Self::from_palette(
            "dracula",
            Palette {
                bg: 0x282a36,
                fg: 0xf8f8f2,
                green: 0x50fa7b,
                blue: 0x8be9fd,
                red: 0xff5555,
                yellow: 0xf1fa8c,
                border: 0x44475a,
                selection: 0x44475a,
                muted: 0x6272a4,
                accent: 0xbd93f9,
            },
        )
    }

    pub const fn nord() -> Self {
        Self::from_palette(
            "nord",
            Palette {
                bg: 0x2e3440,
                fg: 0xd8dee9,
                green: 0xa3be8c,
                blue: 0x81a1c1,
                red: 0xbf616a,
                yellow: 0xebcb8b,
                border: 0x4c566a,
                selection: 0x434c5e,
                muted: 0x6b7089,
                accent: 0xb48ead,
            },
        )
    }

    /// Look a theme up by name, ignoring case.
    pub fn by_name(name: &str) -> Option<&'static Theme> {
        THEMES.iter().find(|t| t.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn log_color(&self, origin: LogOrigin) -> Color {
        match origin {
            LogOrigin::Device => self.device_color,
            LogOrigin::Local => self.local_color,
        }
    }

    pub fn notice_color(&self, level: NoticeLevel) -> Color {
        match level {
            NoticeLevel::Info => self.accent,
            NoticeLevel::Warning => self.warning_color,
            NoticeLevel::Error => self.error_color,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

/// Available themes
pub static THEMES: &[Theme] = &[
    Theme::dark(),
    Theme::light(),
    Theme::solarized_dark(),
    Theme::dracula(),
    Theme::nord(),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_by_name() {
        for name in ["dark", "light", "solarized", "dracula", "nord"] {
            assert_eq!(Theme::by_name(name).map(|t| t.name), Some(name));
        }
        assert_eq!(Theme::by_name(" Nord ").map(|t| t.name), Some("nord"));
        assert!(Theme::by_name("nonexistent").is_none());
    }

    #[test]
    fn test_semantic_colors() {
        let theme = Theme::default();
        assert_eq!(theme.name, "dark");
        assert_eq!(theme.log_color(LogOrigin::Device), theme.device_color);
        assert_eq!(theme.notice_color(NoticeLevel::Error), theme.error_color);
        assert_eq!(theme.bg, Color::Rgb(30, 30, 46));
    }
}
