use std::{
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use crate::{
    config::EncodeParams,
    core::{Canvas, Fps},
    error::{PulseError, PulseResult},
    render::frame::FrameRGBA,
};

/// Everything the ffmpeg invocation needs, resolved up front.
#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    /// Source audio, muxed into the output unmodified in timing.
    pub audio_path: PathBuf,
    pub out_path: PathBuf,
    pub video_codec: String,
    pub audio_codec: String,
    pub preset: String,
    pub threads: Option<u32>,
    pub overwrite: bool,
}

impl EncodeConfig {
    pub fn new(
        params: &EncodeParams,
        canvas: Canvas,
        fps: Fps,
        audio_path: impl Into<PathBuf>,
        out_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            width: canvas.width,
            height: canvas.height,
            fps,
            audio_path: audio_path.into(),
            out_path: out_path.into(),
            video_codec: params.video_codec.clone(),
            audio_codec: params.audio_codec.clone(),
            preset: params.preset.clone(),
            threads: params.threads,
            overwrite: true,
        }
    }

    pub fn validate(&self) -> PulseResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PulseError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            // We target yuv420p output for maximum compatibility.
            return Err(PulseError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(PulseError::validation("encode fps must be non-zero"));
        }
        if self.threads == Some(0) {
            return Err(PulseError::validation("encode threads must be >= 1"));
        }
        Ok(())
    }

    fn fps_arg(&self) -> String {
        if self.fps.den == 1 {
            self.fps.num.to_string()
        } else {
            format!("{}/{}", self.fps.num, self.fps.den)
        }
    }
}

/// The full argument list, split out from spawning so it can be unit tested.
pub fn build_ffmpeg_args(cfg: &EncodeConfig) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    args.push((if cfg.overwrite { "-y" } else { "-n" }).to_string());
    args.extend(
        [
            "-loglevel",
            "error",
            // Input 0: raw frames on stdin.
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
        ]
        .map(str::to_string),
    );
    args.push(format!("{}x{}", cfg.width, cfg.height));
    args.push("-r".to_string());
    args.push(cfg.fps_arg());
    args.extend(["-i", "pipe:0"].map(str::to_string));

    // Input 1: the original audio file.
    args.push("-i".to_string());
    args.push(cfg.audio_path.display().to_string());

    args.extend(["-map", "0:v:0", "-map", "1:a:0"].map(str::to_string));

    args.push("-c:v".to_string());
    args.push(cfg.video_codec.clone());
    args.push("-preset".to_string());
    args.push(cfg.preset.clone());
    args.extend(["-pix_fmt", "yuv420p"].map(str::to_string));

    args.push("-c:a".to_string());
    args.push(cfg.audio_codec.clone());

    if let Some(threads) = cfg.threads {
        args.push("-threads".to_string());
        args.push(threads.to_string());
    }

    // Video duration is derived from the audio; stop at the shorter stream
    // so a trailing partial frame never pads the output.
    args.extend(["-shortest", "-movflags", "+faststart"].map(str::to_string));
    args.push(cfg.out_path.display().to_string());
    args
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> PulseResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Streams RGBA frames to a system `ffmpeg` process that encodes video and
/// muxes the source audio in one pass.
pub struct FfmpegEncoder {
    cfg: EncodeConfig,
    bg_rgba: [u8; 4],
    child: Child,
    stdin: Option<ChildStdin>,
    scratch: Vec<u8>,
}

impl FfmpegEncoder {
    pub fn new(cfg: EncodeConfig, bg_rgba: [u8; 4]) -> PulseResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;

        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(PulseError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(PulseError::encode(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }
        if !cfg.audio_path.is_file() {
            return Err(PulseError::validation(format!(
                "audio file '{}' does not exist",
                cfg.audio_path.display()
            )));
        }

        // We intentionally use the system `ffmpeg` binary rather than
        // `ffmpeg-next` to avoid native FFmpeg dev header/lib requirements.
        let args = build_ffmpeg_args(&cfg);
        tracing::debug!(?args, "spawning ffmpeg");
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                PulseError::encode(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PulseError::encode("failed to open ffmpeg stdin (unexpected)"))?;

        Ok(Self {
            scratch: vec![0u8; (cfg.width * cfg.height * 4) as usize],
            cfg,
            bg_rgba,
            child,
            stdin: Some(stdin),
        })
    }

    pub fn encode_frame(&mut self, frame: &FrameRGBA) -> PulseResult<()> {
        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(PulseError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }

        if frame.data.len() != self.scratch.len() {
            return Err(PulseError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }

        flatten_to_opaque_rgba8(
            &mut self.scratch,
            &frame.data,
            frame.premultiplied,
            self.bg_rgba,
        )?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(PulseError::encode("ffmpeg encoder is already finalized"));
        };

        use std::io::Write as _;
        stdin
            .write_all(&self.scratch)
            .map_err(|e| PulseError::encode(format!("failed to write frame to ffmpeg stdin: {e}")))?;

        Ok(())
    }

    /// Close stdin, wait for ffmpeg, and surface its stderr on failure.
    pub fn finish(mut self) -> PulseResult<PathBuf> {
        drop(self.stdin.take());

        let output = self
            .child
            .wait_with_output()
            .map_err(|e| PulseError::encode(format!("failed to wait for ffmpeg to finish: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PulseError::encode(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(self.cfg.out_path)
    }
}

fn flatten_to_opaque_rgba8(
    dst: &mut [u8],
    src: &[u8],
    src_is_premul: bool,
    bg_rgba: [u8; 4],
) -> PulseResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(PulseError::validation(
            "flatten_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = bg_rgba[0] as u16;
    let bg_g = bg_rgba[1] as u16;
    let bg_b = bg_rgba[2] as u16;

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(s);
            d[3] = 255;
            continue;
        }

        let inv = 255u16 - a;

        let (r, g, b) = if src_is_premul {
            (
                s[0] as u16 + mul_div255(bg_r, inv),
                s[1] as u16 + mul_div255(bg_g, inv),
                s[2] as u16 + mul_div255(bg_b, inv),
            )
        } else {
            (
                mul_div255(s[0] as u16, a) + mul_div255(bg_r, inv),
                mul_div255(s[1] as u16, a) + mul_div255(bg_g, inv),
                mul_div255(s[2] as u16, a) + mul_div255(bg_b, inv),
            )
        };

        d[0] = r.min(255) as u8;
        d[1] = g.min(255) as u8;
        d[2] = b.min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}
