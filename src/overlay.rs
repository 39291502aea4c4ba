use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use tiny_skia::{
    Color, FillRule, Paint, PathBuilder, Pixmap, PremultipliedColorU8, Rect, Transform,
};

/// Full-window prompt shown whenever the media engine is not the one
/// painting: before the first key press, while paused, and for the whole
/// session in a dry-run build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Start,
    Paused,
    Recording,
}

impl Prompt {
    pub fn headline(self) -> &'static str {
        match self {
            Prompt::Start => "Press any key to start",
            Prompt::Paused => "Paused: press any key to continue",
            Prompt::Recording => "Recording responses",
        }
    }

    pub fn hint(self) -> Option<&'static str> {
        match self {
            Prompt::Start => Some("The first key press starts the clip and is not recorded"),
            Prompt::Paused => Some("Pause time is excluded from response times"),
            Prompt::Recording => None,
        }
    }
}

// Checked in order when no font is given on the command line. The
// marker glyphs below keep prompts legible even when none resolves.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\segoeui.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

fn load_font(explicit: Option<&Path>) -> Option<FontVec> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(path) = explicit {
        if !path.is_file() {
            warn!("requested prompt font {} does not exist", path.display());
        }
        candidates.push(path.to_path_buf());
    }
    candidates.extend(FONT_CANDIDATES.iter().map(PathBuf::from));

    for path in candidates {
        let Ok(bytes) = fs::read(&path) else {
            continue;
        };
        match FontVec::try_from_vec(bytes) {
            Ok(font) => {
                info!("prompt font: {}", path.display());
                return Some(font);
            }
            Err(err) => warn!("unusable font {}: {}", path.display(), err),
        }
    }
    warn!("no usable prompt font found; prompt text moves to the window title");
    None
}

pub struct PromptOverlay {
    width: u32,
    height: u32,
    font: Option<FontVec>,
}

impl PromptOverlay {
    pub fn new(width: u32, height: u32, font_path: Option<&Path>) -> Self {
        Self {
            width,
            height,
            font: load_font(font_path),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Whether prompt text can be rasterised. Without a font only the
    /// markers are drawn and the window title carries the headline.
    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Repaints `pixmap` as the given prompt screen.
    pub fn render(&self, pixmap: &mut Pixmap, prompt: Prompt) {
        pixmap.fill(Color::BLACK);
        let cx = self.width as f32 / 2.0;
        let cy = self.height as f32 / 2.0;

        match prompt {
            Prompt::Start => self.draw_start_marker(pixmap, cx, cy - 60.0),
            Prompt::Paused => self.draw_pause_marker(pixmap, cx, cy - 60.0),
            Prompt::Recording => self.draw_recording_marker(pixmap, cx, cy - 60.0),
        }

        self.draw_text_centered(pixmap, prompt.headline(), cx, cy + 44.0, 30.0, Color::WHITE);
        if let Some(hint) = prompt.hint() {
            let grey = Color::from_rgba8(170, 170, 170, 255);
            self.draw_text_centered(pixmap, hint, cx, cy + 82.0, 17.0, grey);
        }
    }

    fn draw_start_marker(&self, pixmap: &mut Pixmap, cx: f32, cy: f32) {
        let mut pb = PathBuilder::new();
        pb.move_to(cx - 28.0, cy - 36.0);
        pb.line_to(cx - 28.0, cy + 36.0);
        pb.line_to(cx + 36.0, cy);
        pb.close();
        if let Some(path) = pb.finish() {
            let paint = solid(Color::WHITE);
            pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        }
    }

    fn draw_pause_marker(&self, pixmap: &mut Pixmap, cx: f32, cy: f32) {
        let paint = solid(Color::WHITE);
        for x in [cx - 28.0, cx + 8.0] {
            if let Some(rect) = Rect::from_xywh(x, cy - 36.0, 20.0, 72.0) {
                pixmap.fill_rect(rect, &paint, Transform::identity(), None);
            }
        }
    }

    fn draw_recording_marker(&self, pixmap: &mut Pixmap, cx: f32, cy: f32) {
        let mut pb = PathBuilder::new();
        pb.push_circle(cx, cy, 18.0);
        if let Some(path) = pb.finish() {
            let paint = solid(Color::from_rgba8(214, 48, 49, 255));
            pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        }
    }

    fn draw_text_centered(
        &self,
        pixmap: &mut Pixmap,
        text: &str,
        center_x: f32,
        baseline_y: f32,
        size: f32,
        color: Color,
    ) {
        let Some(font) = &self.font else {
            return;
        };
        let scale = PxScale::from(size);
        let scaled = font.as_scaled(scale);

        let mut width = 0.0;
        let mut previous = None;
        for c in text.chars() {
            if c.is_control() {
                continue;
            }
            let id = font.glyph_id(c);
            if let Some(prev) = previous {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            previous = Some(id);
        }

        let rgba = color.to_color_u8();
        let stride = pixmap.width() as i32;
        let rows = pixmap.height() as i32;
        let mut caret = point(center_x - width / 2.0, baseline_y);
        let mut previous = None;
        let pixels = pixmap.pixels_mut();
        for c in text.chars() {
            if c.is_control() {
                continue;
            }
            let mut glyph = scaled.scaled_glyph(c);
            if let Some(prev) = previous {
                caret.x += scaled.kern(prev, glyph.id);
            }
            glyph.position = caret;
            caret.x += scaled.h_advance(glyph.id);
            previous = Some(glyph.id);

            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let x = bounds.min.x as i32 + gx as i32;
                let y = bounds.min.y as i32 + gy as i32;
                if x < 0 || y < 0 || x >= stride || y >= rows || coverage <= 0.0 {
                    return;
                }
                // Text sits on the cleared backdrop, so coverage scaling
                // stands in for a full source-over blend.
                let premultiplied = PremultipliedColorU8::from_rgba(
                    (rgba.red() as f32 * coverage) as u8,
                    (rgba.green() as f32 * coverage) as u8,
                    (rgba.blue() as f32 * coverage) as u8,
                    (coverage * rgba.alpha() as f32) as u8,
                );
                if let Some(premultiplied) = premultiplied {
                    pixels[(y * stride + x) as usize] = premultiplied;
                }
            });
        }
    }
}

fn solid(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    paint
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_have_distinct_headlines() {
        let headlines = [
            Prompt::Start.headline(),
            Prompt::Paused.headline(),
            Prompt::Recording.headline(),
        ];
        assert_ne!(headlines[0], headlines[1]);
        assert_ne!(headlines[1], headlines[2]);
    }

    #[test]
    fn render_clears_to_opaque_black() {
        let overlay = PromptOverlay::new(640, 480, None);
        let mut pixmap = Pixmap::new(640, 480).unwrap();
        overlay.render(&mut pixmap, Prompt::Start);
        let corner = pixmap.pixel(2, 2).unwrap();
        assert_eq!((corner.red(), corner.green(), corner.blue()), (0, 0, 0));
        assert_eq!(corner.alpha(), 255);
    }

    #[test]
    fn markers_draw_without_any_font() {
        let overlay = PromptOverlay {
            width: 640,
            height: 480,
            font: None,
        };
        let mut pixmap = Pixmap::new(640, 480).unwrap();
        overlay.render(&mut pixmap, Prompt::Start);
        // Centre of the start triangle (marker centre is 60px above the
        // window centre).
        let inside = pixmap.pixel(320, 180).unwrap();
        assert!(inside.red() > 0);
    }
}
