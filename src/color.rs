use std::sync::LazyLock;

use palette::{Hsl, IntoColor, Srgb};
use regex::Regex;

/// Colormap used when an experiment does not name one.
pub const DEFAULT_COLORMAP: &str = "interpolateTurbo";

static COLORMAP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(interpolate|scheme)[A-Za-z0-9]*(#inverse(,[A-Za-z0-9]+)*)?$")
        .expect("static colormap pattern")
});

// ---------------------------------------------------------------------------
// Format checks
// ---------------------------------------------------------------------------

/// Categorical colors are HTML color strings the renderer can parse.
pub fn is_html_color(color: &str) -> bool {
    color.starts_with("rgb(") || color.starts_with("hsl(") || color.starts_with('#')
}

/// D3 continuous scale name (`interpolateViridis`, `schemeAccent`, ...),
/// optionally followed by `#inverse`.
pub fn is_colormap_name(name: &str) -> bool {
    COLORMAP_RE.is_match(name)
}

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues,
/// formatted as `rgb(r, g, b)`.
pub fn generate_palette(n: usize) -> Vec<String> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            format!(
                "rgb({}, {}, {})",
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_colors() {
        assert!(is_html_color("rgb(255, 0, 0)"));
        assert!(is_html_color("hsl(120, 50%, 50%)"));
        assert!(is_html_color("#00ff00"));
        assert!(!is_html_color("blue"));
        assert!(!is_html_color("RGB(1,2,3)"));
    }

    #[test]
    fn test_colormap_names() {
        assert!(is_colormap_name("interpolateTurbo"));
        assert!(is_colormap_name("schemeYlOrRd"));
        assert!(is_colormap_name("interpolateViridis#inverse"));
        assert!(!is_colormap_name("viridis"));
        assert!(!is_colormap_name("interpolateTurbo#reverse"));
        assert!(!is_colormap_name("scheme Accent"));
    }

    #[test]
    fn test_palette_is_distinct() {
        let palette = generate_palette(6);
        assert_eq!(palette.len(), 6);
        assert!(palette.iter().all(|c| is_html_color(c)));
        let unique: std::collections::BTreeSet<_> = palette.iter().collect();
        assert_eq!(unique.len(), 6);
    }
}
