//! Render style configuration for terminal output.

use nu_ansi_term::{Color, Style};

/// Render style configuration.
#[derive(Debug, Clone, Copy)]
pub struct RenderStyle {
    pub success: Style,
    pub warning: Style,
    pub error: Style,
}

impl RenderStyle {
    /// Plain style with no escape codes.
    pub fn plain() -> Self {
        Self {
            success: Style::new(),
            warning: Style::new(),
            error: Style::new(),
        }
    }

    /// Style for the current process: plain when `NO_COLOR` is set.
    pub fn current() -> Self {
        if std::env::var_os("NO_COLOR").is_some() {
            Self::plain()
        } else {
            Self::default()
        }
    }
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            success: Color::Green.normal(),
            warning: Color::Yellow.normal(),
            error: Color::Red.normal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_plain_style_has_no_escapes() {
        let style = RenderStyle::plain();
        assert_eq!(style.error.paint("boom").to_string(), "boom");
    }

    #[test]
    #[serial]
    fn test_no_color_env_disables_colors() {
        std::env::set_var("NO_COLOR", "1");
        let painted = RenderStyle::current().success.paint("ok").to_string();
        std::env::remove_var("NO_COLOR");
        assert_eq!(painted, "ok");
    }
}
