use std::{borrow::Cow, path::Path};

use crate::{
    config::CaptionConfig,
    core::Canvas,
    error::{PulseError, PulseResult},
    transcribe::TranscriptSegment,
    visual::premul_bytes_to_paint,
};

/// Black outline width drawn under the white fill, in pixels.
pub const OUTLINE_PX: f64 = 2.0;

/// Built-in caption face, the last resort when neither the preferred font
/// nor any system candidate is readable. Captions never fail for font
/// reasons.
const EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

/// Font files probed when no preferred font is configured. DejaVu Sans Bold
/// first: it ships on most Linux images and matches the look captions had
/// historically.
const FONT_FALLBACKS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Marker brush for Parley layout; fill colors are applied at draw time
/// (black outline passes, then white).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct CaptionBrush;

/// A rasterized caption positioned on the output frame.
///
/// Timeline placement mirrors its source segment: starts at segment start,
/// persists for `end - start`. Overlays are independent; overlapping
/// segments produce overlapping overlays, later ones drawn on top.
#[derive(Clone)]
pub struct CaptionOverlay {
    pub start_sec: f64,
    pub duration_secs: f64,
    /// Top-left placement in frame coordinates.
    pub x: f64,
    pub y: f64,
    pub width: u32,
    pub height: u32,
    paint: vello_cpu::Image,
}

impl CaptionOverlay {
    pub fn end_sec(&self) -> f64 {
        self.start_sec + self.duration_secs
    }

    pub fn active_at(&self, t: f64) -> bool {
        t >= self.start_sec && t < self.end_sec()
    }

    pub(crate) fn paint(&self) -> &vello_cpu::Image {
        &self.paint
    }
}

/// Greedy word wrap to a fixed character-column width. Words longer than
/// the column width stand alone on their own line.
pub fn wrap_text(text: &str, cols: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_cols = 0usize;

    for word in text.split_whitespace() {
        let word_cols = word.chars().count();
        if current.is_empty() {
            current.push_str(word);
            current_cols = word_cols;
        } else if current_cols + 1 + word_cols <= cols {
            current.push(' ');
            current.push_str(word);
            current_cols += 1 + word_cols;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_cols = word_cols;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

/// Top-left position for an overlay: horizontally centered, vertically
/// centered on the `anchor_frac * canvas.height` line, clamped into frame.
pub(crate) fn anchor_position(
    overlay_w: u32,
    overlay_h: u32,
    canvas: Canvas,
    anchor_frac: f64,
) -> (f64, f64) {
    let x = (f64::from(canvas.width) - f64::from(overlay_w)) / 2.0;
    let y = anchor_frac * f64::from(canvas.height) - f64::from(overlay_h) / 2.0;
    (x.max(0.0), y.max(0.0))
}

/// Rasterizes caption text with Parley layout and vello_cpu glyph fills.
pub struct CaptionRenderer {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<CaptionBrush>,
    family_name: String,
    font: vello_cpu::peniko::FontData,
}

impl CaptionRenderer {
    /// Load the preferred font, falling back to a known system font file
    /// and finally to the embedded face.
    pub fn new(preferred_font: Option<&Path>) -> PulseResult<Self> {
        let bytes = resolve_font_bytes(preferred_font);

        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(bytes.clone()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            PulseError::render("no font families registered from caption font bytes")
        })?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| PulseError::render("registered caption font family has no name"))?
            .to_string();

        tracing::debug!(family = %family_name, "caption font resolved");

        let font =
            vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(bytes), 0);

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            font,
        })
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    /// Rasterize one segment into a positioned overlay.
    pub fn render_overlay(
        &mut self,
        segment: &TranscriptSegment,
        cfg: &CaptionConfig,
        canvas: Canvas,
    ) -> PulseResult<CaptionOverlay> {
        segment.validate()?;
        let wrapped = wrap_text(segment.text.trim(), cfg.wrap_cols);
        if wrapped.is_empty() {
            return Err(PulseError::validation("caption text must be non-empty"));
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, &wrapped, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(cfg.font_size_px));
        builder.push_default(parley::style::StyleProperty::Brush(CaptionBrush));

        let mut layout: parley::Layout<CaptionBrush> = builder.build(&wrapped);
        layout.break_all_lines(None);
        let text_width = layout.width();
        layout.align(
            Some(text_width),
            parley::Alignment::Center,
            parley::AlignmentOptions::default(),
        );

        let pad = OUTLINE_PX.ceil();
        let width = (layout.width().ceil() as u32 + 2 * pad as u32).max(1);
        let height = (layout.height().ceil() as u32 + 2 * pad as u32).max(1);
        let w16: u16 = width
            .try_into()
            .map_err(|_| PulseError::render("caption raster width exceeds u16"))?;
        let h16: u16 = height
            .try_into()
            .map_err(|_| PulseError::render("caption raster height exceeds u16"))?;

        let mut ctx = vello_cpu::RenderContext::new(w16, h16);

        // Outline first: black fill at the 8 neighbor offsets, then the
        // white fill on top.
        let black = vello_cpu::peniko::Color::from_rgba8(0, 0, 0, 255);
        let white = vello_cpu::peniko::Color::from_rgba8(255, 255, 255, 255);
        for dy in [-OUTLINE_PX, 0.0, OUTLINE_PX] {
            for dx in [-OUTLINE_PX, 0.0, OUTLINE_PX] {
                if dx == 0.0 && dy == 0.0 {
                    continue;
                }
                self.draw_glyphs(&mut ctx, &layout, pad + dx, pad + dy, black);
            }
        }
        self.draw_glyphs(&mut ctx, &layout, pad, pad, white);

        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(w16, h16);
        ctx.render_to_pixmap(&mut pixmap);
        let paint = premul_bytes_to_paint(pixmap.data_as_u8_slice(), width, height)?;

        let (x, y) = anchor_position(width, height, canvas, cfg.anchor_frac);
        Ok(CaptionOverlay {
            start_sec: segment.start_sec,
            duration_secs: segment.duration_secs(),
            x,
            y,
            width,
            height,
            paint,
        })
    }

    fn draw_glyphs(
        &self,
        ctx: &mut vello_cpu::RenderContext,
        layout: &parley::Layout<CaptionBrush>,
        dx: f64,
        dy: f64,
        color: vello_cpu::peniko::Color,
    ) {
        ctx.set_transform(vello_cpu::kurbo::Affine::translate((dx, dy)));
        ctx.set_paint(color);
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(&self.font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
    }
}

fn resolve_font_bytes(preferred: Option<&Path>) -> Vec<u8> {
    if let Some(path) = preferred {
        match std::fs::read(path) {
            Ok(bytes) => return bytes,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "preferred caption font unreadable; falling back to system fonts"
                );
            }
        }
    }

    for candidate in FONT_FALLBACKS {
        if let Ok(bytes) = std::fs::read(candidate) {
            tracing::debug!(path = candidate, "using fallback caption font");
            return bytes;
        }
    }

    tracing::debug!("no system caption font found; using the embedded face");
    EMBEDDED_FONT.to_vec()
}
