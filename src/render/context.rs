use crate::config::Theme;
use ratatui::style::Color;

/// Snapshot of theme colors and display configuration for rendering.
/// Passed to widgets to avoid threading many individual parameters.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub background: Color,
    pub text_primary: Color,
    pub text_secondary: Color,
    pub accent: Color,
    pub accent_hover: Color,
    pub table_header: Color,
    pub table_header_bg: Color,
    pub cell_bg: Color,
    pub link: Color,
    pub image: Color,
    pub controls_bg: Color,
    pub keybind_hints: Color,
    pub keybind_labels: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub flow_levels: [Color; 3],

    pub link_label: String,
}

impl RenderContext {
    pub fn from_theme(theme: &Theme, link_label: &str) -> Self {
        Self {
            background: theme.get("background"),
            text_primary: theme.get("text_primary"),
            text_secondary: theme.get("text_secondary"),
            accent: theme.get("accent"),
            accent_hover: theme.get("accent_hover"),
            table_header: theme.get("table_header"),
            table_header_bg: theme.get("table_header_bg"),
            cell_bg: theme.get("cell_bg"),
            link: theme.get("link"),
            image: theme.get("image"),
            controls_bg: theme.get("controls_bg"),
            keybind_hints: theme.get("keybind_hints"),
            keybind_labels: theme.get("keybind_labels"),
            success: theme.get("success"),
            warning: theme.get("warning"),
            error: theme.get("error"),
            flow_levels: [
                theme.get("flow_level_1"),
                theme.get("flow_level_2"),
                theme.get("flow_level_3"),
            ],
            link_label: link_label.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThemeConfig;

    #[test]
    fn test_unknown_names_fall_back_to_reset() {
        let theme = Theme {
            colors: std::collections::HashMap::new(),
        };
        let ctx = RenderContext::from_theme(&theme, "open link");
        assert_eq!(ctx.accent, Color::Reset);
        assert_eq!(ctx.link_label, "open link");
    }

    #[test]
    fn test_from_default_theme() {
        let theme = Theme::from_config(&ThemeConfig::default()).unwrap();
        let ctx = RenderContext::from_theme(&theme, "open link");
        assert_eq!(ctx.warning, theme.get("warning"));
        assert_eq!(ctx.flow_levels[2], theme.get("flow_level_3"));
    }
}
