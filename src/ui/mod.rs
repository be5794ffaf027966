pub mod widgets;

use ratatui::style::Color;

/// Classification bands for a sentiment score in [0, 5].
pub fn sentiment_style(score: f64) -> (Color, &'static str) {
    if score >= 4.0 {
        (Color::Green, "Positive")
    } else if score >= 3.0 {
        (Color::Yellow, "Neutral")
    } else if score >= 2.0 {
        (Color::LightRed, "Negative")
    } else {
        (Color::Red, "Very Negative")
    }
}
