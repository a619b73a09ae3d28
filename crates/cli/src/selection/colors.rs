use crossterm::style::Color;
use sdm_ui_core::model::DataSource;

/// Trait for picking the terminal colour of a row
pub trait StatusColor {
    fn foreground_color(&self) -> Option<Color>;
}

impl StatusColor for DataSource {
    fn foreground_color(&self) -> Option<Color> {
        if self.is_connected() {
            Some(Color::Green)
        } else if self.is_web() {
            Some(Color::Cyan)
        } else {
            None
        }
    }
}
