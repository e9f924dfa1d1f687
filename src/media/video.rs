//! FFmpeg-backed video source.
//!
//! Keeps one demuxer/decoder/scaler open for the session. Playback decodes
//! sequentially; seeks go through `av_seek_frame` to the previous keyframe and
//! decode forward to the target. Recently shown frames stay in an LRU cache so
//! stepping back and forth does not re-decode.

use image::RgbaImage;
use log::{debug, info, trace, warn};
use lru::LruCache;
use playa_ffmpeg as ffmpeg;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::Instant;

use super::playback::PresentGate;
use super::{MediaError, MediaSource, Presentation};
use crate::core::frame_clock::frame_at;

static FFMPEG_LOG_INIT: Once = Once::new();

const FRAME_CACHE_SIZE: usize = 64;

fn init_ffmpeg_logging() {
    FFMPEG_LOG_INIT.call_once(|| unsafe {
        ffmpeg::ffi::av_log_set_level(ffmpeg::ffi::AV_LOG_QUIET);
    });
}

/// Stream properties read when the file is opened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration: f64,
}

struct Decoder {
    ictx: ffmpeg::format::context::Input,
    stream_idx: usize,
    decoder: ffmpeg::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    /// Seconds per timestamp unit
    time_base: f64,
    /// Last frame index handed out, for sequential reads
    position: Option<i64>,
    eof: bool,
}

impl Decoder {
    fn open(path: &Path) -> Result<(Self, VideoInfo), MediaError> {
        init_ffmpeg_logging();
        let ictx = ffmpeg::format::input(path).map_err(|e| MediaError::Open(format!("{}: {}", path.display(), e)))?;
        let stream = ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| MediaError::Open("no video stream found".into()))?;
        let stream_idx = stream.index();

        let tb = stream.time_base();
        let time_base = tb.numerator() as f64 / tb.denominator().max(1) as f64;
        let rate = stream.avg_frame_rate();
        let fps = if rate.numerator() > 0 && rate.denominator() > 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            30.0
        };
        let stream_duration = stream.duration() as f64 * time_base;
        let duration = if stream_duration > 0.0 {
            stream_duration
        } else {
            ictx.duration().max(0) as f64 / ffmpeg::ffi::AV_TIME_BASE as f64
        };

        let mut decoder_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| MediaError::Open(format!("decoder context: {}", e)))?;
        unsafe {
            (*decoder_ctx.as_mut_ptr()).thread_type = ffmpeg::ffi::FF_THREAD_FRAME;
            (*decoder_ctx.as_mut_ptr()).thread_count = 0;
        }
        let decoder = decoder_ctx
            .decoder()
            .video()
            .map_err(|e| MediaError::Open(format!("video decoder: {}", e)))?;
        let (width, height) = (decoder.width(), decoder.height());
        let scaler = ffmpeg::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg::format::Pixel::RGBA,
            width,
            height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| MediaError::Open(format!("scaler: {}", e)))?;

        let info = VideoInfo {
            width,
            height,
            fps,
            duration,
        };
        Ok((
            Self {
                ictx,
                stream_idx,
                decoder,
                scaler,
                time_base,
                position: None,
                eof: false,
            },
            info,
        ))
    }

    fn seek(&mut self, frame: i64, fps: f64) {
        let ts = self.frame_to_ts(frame, fps);
        let ret = unsafe {
            ffmpeg::ffi::av_seek_frame(
                self.ictx.as_mut_ptr(),
                self.stream_idx as i32,
                ts,
                ffmpeg::ffi::AVSEEK_FLAG_BACKWARD,
            )
        };
        if ret < 0 {
            warn!("Video seek to frame {} failed (ret={})", frame, ret);
        }
        self.decoder.flush();
        self.eof = false;
        self.position = None;
    }

    fn frame_to_ts(&self, frame: i64, fps: f64) -> i64 {
        if self.time_base <= 0.0 || fps <= 0.0 {
            return 0;
        }
        (frame as f64 / fps / self.time_base).round() as i64
    }

    fn next_decoded(&mut self) -> Result<Option<ffmpeg::util::frame::video::Video>, MediaError> {
        let mut decoded = ffmpeg::util::frame::video::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return Ok(Some(decoded));
            }
            if self.eof {
                return Ok(None);
            }
            let mut sent = false;
            for (stream, packet) in self.ictx.packets() {
                if stream.index() == self.stream_idx {
                    self.decoder
                        .send_packet(&packet)
                        .map_err(|e| MediaError::Decode(format!("send packet: {}", e)))?;
                    sent = true;
                    break;
                }
            }
            if !sent {
                self.eof = true;
                let _ = self.decoder.send_eof();
            }
        }
    }

    fn decode(&mut self, frame: i64, fps: f64) -> Result<RgbaImage, MediaError> {
        let sequential = self.position.map(|p| frame == p + 1).unwrap_or(false);
        if !sequential {
            trace!("Decoder: seek to frame {}", frame);
            self.seek(frame, fps);
        }
        let target_ts = self.frame_to_ts(frame, fps);
        let half_frame = (self.frame_to_ts(1, fps) / 2).max(1);
        while let Some(decoded) = self.next_decoded()? {
            let reached = sequential || decoded.pts().map(|pts| pts + half_frame >= target_ts).unwrap_or(true);
            if reached {
                self.position = Some(frame);
                return self.to_rgba(&decoded);
            }
        }
        Err(MediaError::EndOfStream)
    }

    fn to_rgba(&mut self, decoded: &ffmpeg::util::frame::video::Video) -> Result<RgbaImage, MediaError> {
        let mut rgba = ffmpeg::util::frame::video::Video::empty();
        self.scaler
            .run(decoded, &mut rgba)
            .map_err(|e| MediaError::Decode(format!("scale: {}", e)))?;
        let (width, height) = (rgba.width(), rgba.height());
        let stride = rgba.stride(0);
        let row_bytes = width as usize * 4;
        let src = rgba.data(0);
        let mut out = Vec::with_capacity(row_bytes * height as usize);
        for y in 0..height as usize {
            out.extend_from_slice(&src[y * stride..y * stride + row_bytes]);
        }
        RgbaImage::from_raw(width, height, out).ok_or_else(|| MediaError::Decode("frame buffer size mismatch".into()))
    }
}

/// A video file played through FFmpeg.
pub struct VideoMedia {
    path: PathBuf,
    info: VideoInfo,
    decoder: Decoder,
    cache: LruCache<i64, Arc<RgbaImage>>,
    current_time: f64,
    playing: bool,
    /// (wall clock, media time) when playback last started
    anchor: Option<(Instant, f64)>,
    gate: PresentGate,
}

impl VideoMedia {
    pub fn open(path: &Path) -> Result<Self, MediaError> {
        let (decoder, info) = Decoder::open(path)?;
        info!(
            "Video opened: {} ({}x{}, {:.3} fps, {:.2}s)",
            path.display(),
            info.width,
            info.height,
            info.fps,
            info.duration
        );
        Ok(Self {
            path: path.to_path_buf(),
            info,
            decoder,
            cache: LruCache::new(NonZeroUsize::new(FRAME_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN)),
            current_time: 0.0,
            playing: false,
            anchor: None,
            gate: PresentGate::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> VideoInfo {
        self.info
    }

    fn last_frame_index(&self) -> i64 {
        (frame_at(self.info.duration, self.info.fps) - 1).max(0)
    }

    fn frame_image(&mut self, frame: i64) -> Option<Arc<RgbaImage>> {
        if let Some(img) = self.cache.get(&frame) {
            return Some(Arc::clone(img));
        }
        match self.decoder.decode(frame, self.info.fps) {
            Ok(img) => {
                let img = Arc::new(img);
                self.cache.put(frame, Arc::clone(&img));
                Some(img)
            }
            Err(e) => {
                warn!("Frame {} unavailable: {}", frame, e);
                None
            }
        }
    }
}

impl MediaSource for VideoMedia {
    fn is_ready(&self) -> bool {
        self.info.width > 0 && self.info.height > 0
    }

    fn intrinsic_size(&self) -> Option<(u32, u32)> {
        self.is_ready().then_some((self.info.width, self.info.height))
    }

    fn fps(&self) -> f64 {
        self.info.fps
    }

    fn duration(&self) -> f64 {
        self.info.duration
    }

    fn current_time(&self) -> f64 {
        self.current_time
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn play(&mut self) {
        if self.playing {
            return;
        }
        if self.current_time >= self.info.duration {
            self.current_time = 0.0;
        }
        self.playing = true;
        self.anchor = Some((Instant::now(), self.current_time));
        debug!("Playback started at {:.3}s", self.current_time);
    }

    fn pause(&mut self) {
        if !self.playing {
            return;
        }
        self.playing = false;
        self.anchor = None;
        self.gate.invalidate();
        debug!("Playback paused at {:.3}s", self.current_time);
    }

    fn seek(&mut self, t: f64) {
        self.current_time = t.clamp(0.0, self.info.duration.max(0.0));
        if self.playing {
            self.anchor = Some((Instant::now(), self.current_time));
        }
        self.gate.invalidate();
        trace!("Seek to {:.3}s", self.current_time);
    }

    fn poll(&mut self, now: Instant) -> Option<Presentation> {
        if let Some((started, media_start)) = self.anchor {
            let t = media_start + now.saturating_duration_since(started).as_secs_f64();
            if t >= self.info.duration {
                self.current_time = self.info.duration;
                self.playing = false;
                self.anchor = None;
                self.gate.invalidate();
            } else {
                self.current_time = t;
            }
        }

        let frame = frame_at(self.current_time, self.info.fps).min(self.last_frame_index());
        if !self.gate.should_present(frame) {
            return None;
        }
        let image = self.frame_image(frame)?;
        self.gate.presented(frame);
        Some(Presentation {
            media_time: self.current_time,
            image,
            playing: self.playing,
        })
    }
}
