use anyhow::Result;
use log::error;
use plotters::prelude::RGBColor;

pub static FONT_SIZE: i32 = 16;
pub static STROKE_WIDTH: u32 = 1;

// Muted palette, in the order bars are colored when no baseline applies
pub static PALETTE: [&str; 8] = [
    "blue", "orange", "green", "red", "purple", "brown", "pink", "gray",
];

pub fn get_color_from_label(label: &str) -> Result<RGBColor> {
    match label {
        "blue" => Ok(RGBColor(76, 114, 176)),
        "orange" => Ok(RGBColor(221, 132, 82)),
        "green" => Ok(RGBColor(85, 168, 104)),
        "red" => Ok(RGBColor(196, 78, 82)),
        "purple" => Ok(RGBColor(129, 114, 179)),
        "brown" => Ok(RGBColor(147, 120, 96)),
        "pink" => Ok(RGBColor(218, 139, 195)),
        "gray" => Ok(RGBColor(140, 140, 140)),
        _ => {
            error!("unrecognized label for color (label={label})");
            anyhow::bail!("unrecognized label (label={label})");
        }
    }
}

/// Color for the `idx`-th series, cycling through the palette.
pub fn get_color_for_index(idx: usize) -> Result<RGBColor> {
    get_color_from_label(PALETTE[idx % PALETTE.len()])
}
