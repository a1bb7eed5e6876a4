/// Pie chart rendering for the statistics endpoint
///
/// Each chart is drawn into its own panel, panels sit side by side, and
/// the figure is encoded as PNG in memory.
use crate::{
    config::ChartConfig,
    error::{CastError, CastResult},
};
use image::{ImageFormat, Rgb, RgbImage};
use std::f64::consts::PI;
use std::io::Cursor;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// One labelled slice with its raw count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieSlice {
    pub label: String,
    pub count: i64,
}

/// A titled pie chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieChart {
    pub title: String,
    pub slices: Vec<PieSlice>,
}

impl PieChart {
    fn total(&self) -> i64 {
        self.slices.iter().map(|slice| slice.count).sum()
    }
}

/// Turns pie charts into an encoded bitmap
pub trait ChartRenderer: Send + Sync {
    /// Render all charts in a single row
    fn render(&self, charts: &[PieChart]) -> CastResult<Vec<u8>>;

    /// MIME type of the rendered bytes
    fn content_type(&self) -> &'static str;
}

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([30, 30, 120]);
const TEXT: Rgb<u8> = Rgb([40, 40, 40]);

// Qualitative "Accent" palette
const PALETTE: [Rgb<u8>; 8] = [
    Rgb([127, 201, 127]),
    Rgb([190, 174, 212]),
    Rgb([253, 192, 134]),
    Rgb([255, 255, 153]),
    Rgb([56, 108, 176]),
    Rgb([240, 2, 127]),
    Rgb([191, 91, 23]),
    Rgb([102, 102, 102]),
];

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const TEXT_SCALE: u32 = 2;
const CHAR_ADVANCE: u32 = (GLYPH_WIDTH + 1) * TEXT_SCALE;
const LINE_HEIGHT: u32 = (GLYPH_HEIGHT + 2) * TEXT_SCALE;
const MARGIN: u32 = 12;
const SWATCH: u32 = GLYPH_HEIGHT * TEXT_SCALE;

/// PNG pie renderer built on `image`
#[derive(Debug, Clone)]
pub struct PieChartRenderer {
    panel_width: u32,
    panel_height: u32,
}

impl PieChartRenderer {
    pub fn new(config: &ChartConfig) -> Self {
        Self {
            panel_width: config.panel_width,
            panel_height: config.panel_height,
        }
    }

    fn draw_panel(&self, img: &mut RgbImage, left: u32, chart: &PieChart) {
        let width = self.panel_width;
        let height = self.panel_height;

        draw_text(img, left + MARGIN, MARGIN, &chart.title, INK, width - 2 * MARGIN);

        // Legend rows fill at most the bottom half
        let max_rows = ((height / 2) / LINE_HEIGHT).max(1) as usize;
        let legend_rows = chart.slices.len().min(max_rows);
        let legend_top = height - MARGIN - legend_rows as u32 * LINE_HEIGHT;

        let pie_top = MARGIN + LINE_HEIGHT + MARGIN;
        let pie_space = legend_top.saturating_sub(pie_top + MARGIN);
        let radius = (pie_space.min(width - 2 * MARGIN) / 2).max(1);
        let center_x = (left + width / 2) as i64;
        let center_y = (pie_top + pie_space / 2) as i64;

        let total = chart.total();
        if total > 0 {
            draw_pie(img, center_x, center_y, radius as i64, chart, total);
        }

        let hidden = chart.slices.len() - legend_rows;
        for (row, slice) in chart.slices.iter().take(legend_rows).enumerate() {
            let y = legend_top + row as u32 * LINE_HEIGHT;
            let text_left = left + MARGIN + SWATCH + TEXT_SCALE * 3;
            let max_text = width - (text_left - left) - MARGIN;

            let last_row_with_overflow = hidden > 0 && row == legend_rows - 1;
            if last_row_with_overflow {
                let label = format!("+{} more", hidden + 1);
                draw_text(img, text_left, y, &label, TEXT, max_text);
                continue;
            }

            fill_rect(img, left + MARGIN, y, SWATCH, SWATCH, PALETTE[row % PALETTE.len()]);
            let percent = if total > 0 {
                slice.count as f64 * 100.0 / total as f64
            } else {
                0.0
            };
            let label = format!("{} {:.1}%", slice.label, percent);
            draw_text(img, text_left, y, &label, TEXT, max_text);
        }
    }
}

impl ChartRenderer for PieChartRenderer {
    fn render(&self, charts: &[PieChart]) -> CastResult<Vec<u8>> {
        if charts.is_empty() {
            return Err(CastError::Chart("Nothing to draw".to_string()));
        }

        let width = self.panel_width * charts.len() as u32;
        let mut img = RgbImage::from_pixel(width, self.panel_height, BACKGROUND);

        for (i, chart) in charts.iter().enumerate() {
            self.draw_panel(&mut img, i as u32 * self.panel_width, chart);
        }

        let mut buf = Vec::new();
        let mut cursor = Cursor::new(&mut buf);
        img.write_to(&mut cursor, ImageFormat::Png)?;

        Ok(buf)
    }

    fn content_type(&self) -> &'static str {
        "image/png"
    }
}

/// Fill a circle, slices running clockwise from twelve o'clock
fn draw_pie(img: &mut RgbImage, cx: i64, cy: i64, radius: i64, chart: &PieChart, total: i64) {
    let mut bounds = Vec::with_capacity(chart.slices.len());
    let mut running = 0i64;
    for slice in &chart.slices {
        running += slice.count;
        bounds.push(running as f64 / total as f64);
    }

    let (img_w, img_h) = img.dimensions();
    for y in (cy - radius).max(0)..=(cy + radius).min(img_h as i64 - 1) {
        for x in (cx - radius).max(0)..=(cx + radius).min(img_w as i64 - 1) {
            let dx = (x - cx) as f64;
            let dy = (y - cy) as f64;
            if dx * dx + dy * dy > (radius * radius) as f64 {
                continue;
            }

            let mut angle = dx.atan2(-dy);
            if angle < 0.0 {
                angle += 2.0 * PI;
            }
            let fraction = angle / (2.0 * PI);

            let index = bounds
                .iter()
                .position(|bound| fraction < *bound)
                .unwrap_or(bounds.len() - 1);
            img.put_pixel(x as u32, y as u32, PALETTE[index % PALETTE.len()]);
        }
    }
}

fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let (img_w, img_h) = img.dimensions();
    for py in y..(y + h).min(img_h) {
        for px in x..(x + w).min(img_w) {
            img.put_pixel(px, py, color);
        }
    }
}

/// Draw upper-cased text, clipped to `max_width` pixels
fn draw_text(img: &mut RgbImage, x: u32, y: u32, text: &str, color: Rgb<u8>, max_width: u32) {
    let max_chars = (max_width / CHAR_ADVANCE) as usize;
    for (i, c) in fold_accents(text).chars().take(max_chars).enumerate() {
        let rows = glyph(c.to_ascii_uppercase());
        let gx = x + i as u32 * CHAR_ADVANCE;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (0x10 >> col) != 0 {
                    fill_rect(
                        img,
                        gx + col * TEXT_SCALE,
                        y + row as u32 * TEXT_SCALE,
                        TEXT_SCALE,
                        TEXT_SCALE,
                        color,
                    );
                }
            }
        }
    }
}

/// 5x7 bitmap glyphs, one byte per row, bit 4 leftmost
/// Strip diacritics so that accented letters draw as their base letter
fn fold_accents(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

fn glyph(c: char) -> [u8; 7] {
    match c {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
        '-' | '_' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '+' => [0x00, 0x04, 0x04, 0x1F, 0x04, 0x04, 0x00],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '\'' => [0x04, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00],
        ' ' => [0x00; 7],
        _ => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
    }
}
