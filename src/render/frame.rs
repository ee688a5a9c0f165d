use crate::{
    error::{PulseError, PulseResult},
    timeline::Timeline,
};

/// One rasterized frame, RGBA8 rows top-to-bottom.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    /// Whether `data` carries premultiplied alpha.
    pub premultiplied: bool,
}

/// Render frame `frame` of the timeline. Pure: the same timeline and index
/// always produce the same pixels.
///
/// The base image is drawn at the frame's zoom scale about the canvas
/// center, then every active caption on top in insertion order.
pub fn compose_frame(timeline: &Timeline, frame: u64) -> PulseResult<FrameRGBA> {
    let canvas = timeline.canvas;
    let w16: u16 = canvas
        .width
        .try_into()
        .map_err(|_| PulseError::render("canvas width exceeds u16"))?;
    let h16: u16 = canvas
        .height
        .try_into()
        .map_err(|_| PulseError::render("canvas height exceeds u16"))?;

    let t = timeline.frame_time_secs(frame);
    let scale = timeline.zoom.scale_at(t);

    let mut ctx = vello_cpu::RenderContext::new(w16, h16);
    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);

    // Zoom about the canvas midpoint; the cover-fit already overfills, so
    // scale >= 1 never exposes canvas background.
    let (cx, cy) = canvas.center();
    let zoom = vello_cpu::kurbo::Affine::translate((cx, cy))
        * vello_cpu::kurbo::Affine::scale(scale)
        * vello_cpu::kurbo::Affine::translate((-cx, -cy));
    ctx.set_transform(zoom);
    ctx.set_paint(timeline.base.paint().clone());
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
        0.0,
        0.0,
        f64::from(canvas.width),
        f64::from(canvas.height),
    ));

    for caption in timeline.active_captions(t) {
        ctx.set_transform(vello_cpu::kurbo::Affine::translate((caption.x, caption.y)));
        ctx.set_paint(caption.paint().clone());
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(caption.width),
            f64::from(caption.height),
        ));
    }

    ctx.flush();
    let mut pixmap = vello_cpu::Pixmap::new(w16, h16);
    ctx.render_to_pixmap(&mut pixmap);

    Ok(FrameRGBA {
        width: canvas.width,
        height: canvas.height,
        data: pixmap.data_as_u8_slice().to_vec(),
        premultiplied: true,
    })
}
