//! Neon ASCII banner with gradient (STUDIO CRM).

use crate::domain::DomainError;
use crossterm::ExecutableCommand;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use figlet_rs::FIGfont;
use std::io::{Write, stdout};

/// Neon Purple (#bc13fe).
pub(crate) const NEON_PURPLE: (u8, u8, u8) = (0xbc, 0x13, 0xfe);
/// Cyber Green (#0ff0fc).
pub(crate) const CYBER_GREEN: (u8, u8, u8) = (0x0f, 0xf0, 0xfc);

/// Linear interpolation between two RGB colors. `t` in [0.0, 1.0].
fn lerp_rgb(a: (u8, u8, u8), b: (u8, u8, u8), t: f64) -> (u8, u8, u8) {
    let r = (f64::from(a.0) * (1.0 - t) + f64::from(b.0) * t).round() as u8;
    let g = (f64::from(a.1) * (1.0 - t) + f64::from(b.1) * t).round() as u8;
    let bl = (f64::from(a.2) * (1.0 - t) + f64::from(b.2) * t).round() as u8;
    (r, g, bl)
}

/// Render `text` with the built-in figlet font.
fn render_art(text: &str) -> Result<String, DomainError> {
    let font = FIGfont::standard().map_err(|e| DomainError::Ui(format!("figlet font: {}", e)))?;
    let figure = font
        .convert(text)
        .ok_or_else(|| DomainError::Ui(format!("figlet could not render {:?}", text)))?;
    Ok(figure.to_string())
}

/// Prints "STUDIO CRM" with a gradient from Neon Purple to Cyber Green, then the
/// version and data source. Falls back to plain text if the font cannot render.
pub fn print_welcome(source: &str) {
    let mut out = stdout();
    let art = render_art("STUDIO CRM").unwrap_or_else(|_| "STUDIO CRM\n".to_string());
    let lines: Vec<&str> = art.lines().collect();
    let total = lines.len().max(1);

    for (i, line) in lines.iter().enumerate() {
        let t = if total <= 1 {
            1.0
        } else {
            i as f64 / (total - 1) as f64
        };
        let (r, g, b) = lerp_rgb(NEON_PURPLE, CYBER_GREEN, t);
        let _ = out.execute(SetForegroundColor(Color::Rgb { r, g, b }));
        let _ = out.execute(Print(line));
        let _ = out.execute(Print("\r\n"));
        let _ = out.execute(ResetColor);
    }

    let version = env!("CARGO_PKG_VERSION");
    let _ = out.execute(SetForegroundColor(Color::Rgb {
        r: CYBER_GREEN.0,
        g: CYBER_GREEN.1,
        b: CYBER_GREEN.2,
    }));
    let _ = out.execute(Print(format!("v{}  data: {}\r\n", version, source)));
    let _ = out.execute(ResetColor);
    let _ = out.flush();
}
