// File source backed by Symphonia (MP3, AAC, FLAC, WAV, ...)

mod convert;

use playhead_core::{AudioError, Result, SourceAdapter, SourceInfo};
use std::fs::File;
use std::path::Path;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Random-access reader over one audio track of a file.
///
/// Sequential reads decode forward; any other start frame triggers an
/// accurate seek and the decoded pre-roll is discarded, so `read` is sample
/// exact at every frame.
pub struct SymphoniaSource {
    path: String,
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    info: SourceInfo,
    /// Last decoded packet, planar
    carry: Vec<Vec<f32>>,
    /// Frame index of `carry[_][0]`
    carry_start: u64,
    carry_len: usize,
    /// The reader hit the end of the stream
    drained: bool,
    /// Read error held back so the frames decoded before it could be returned
    deferred: Option<(u64, AudioError)>,
}

impl SymphoniaSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| AudioError::LoadError(format!("Failed to open {}: {}", path.display(), e)))?;

        Self::from_media_source(path, Box::new(file))
    }

    fn from_media_source(path: &Path, media: Box<dyn MediaSource>) -> Result<Self> {
        let media_source_stream = MediaSourceStream::new(media, Default::default());
        let hint = create_hint_from_path(path);

        let probe_result = symphonia::default::get_probe()
            .format(
                &hint,
                media_source_stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioError::UnsupportedFormat(format!("Failed to probe media: {}", e)))?;

        let format_reader = probe_result.format;
        let track = format_reader
            .default_track()
            .ok_or_else(|| AudioError::LoadError("No default track found".to_string()))?;
        let track_id = track.id;
        let codec_params = &track.codec_params;

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| AudioError::UnsupportedFormat("Sample rate not specified".to_string()))?;
        let channels = codec_params
            .channels
            .ok_or_else(|| AudioError::UnsupportedFormat("Channels not specified".to_string()))?
            .count() as u16;
        let total_frames = codec_params.n_frames.ok_or_else(|| {
            AudioError::UnsupportedFormat("Total frame count unknown; cannot seek".to_string())
        })?;

        let decoder = symphonia::default::get_codecs()
            .make(codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::UnsupportedFormat(format!("Failed to create decoder: {}", e)))?;

        let info = SourceInfo {
            total_frames,
            sample_rate,
            channels,
        };
        info.validate()?;

        log::info!(
            "Opened {}: {} Hz, {} channel(s), {} frames",
            path.display(),
            sample_rate,
            channels,
            total_frames
        );

        Ok(Self {
            path: path.to_string_lossy().into_owned(),
            format_reader,
            decoder,
            track_id,
            info,
            carry: vec![Vec::new(); channels as usize],
            carry_start: 0,
            carry_len: 0,
            drained: false,
            deferred: None,
        })
    }

    fn carry_end(&self) -> u64 {
        self.carry_start + self.carry_len as u64
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        let seeked = self
            .format_reader
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: frame,
                    track_id: self.track_id,
                },
            )
            .map_err(|e| AudioError::SourceRead {
                frame,
                message: format!("Seek failed: {}", e),
            })?;

        self.decoder.reset();
        self.carry_start = seeked.actual_ts;
        self.carry_len = 0;
        self.drained = false;
        Ok(())
    }

    /// Decode the next packet of our track into `carry`.
    /// Returns false at end of stream.
    fn decode_next(&mut self, frame: u64) -> Result<bool> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.drained = true;
                    return Ok(false);
                }
                Err(e) => {
                    return Err(AudioError::SourceRead {
                        frame,
                        message: format!("Failed to read packet: {}", e),
                    })
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    self.carry_len = convert::copy_planar(&decoded, &mut self.carry);
                    self.carry_start = packet.ts();
                    return Ok(true);
                }
                // A corrupt packet is skipped; its frames read back as silence
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => {
                    return Err(AudioError::SourceRead {
                        frame,
                        message: format!("Failed to decode packet: {}", e),
                    })
                }
            }
        }
    }
}

impl SourceAdapter for SymphoniaSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn read(&mut self, start: u64, frames: usize, buffers: &mut [Vec<f32>]) -> Result<usize> {
        let total = self.info.total_frames;
        if start >= total || frames == 0 {
            return Ok(0);
        }
        let frames = frames.min((total - start).min(usize::MAX as u64) as usize);

        if let Some((frame, error)) = self.deferred.take() {
            if frame == start {
                return Err(error);
            }
        }

        // Anything other than continuing from the decoded data needs a seek
        let sequential = start >= self.carry_start && start <= self.carry_end();
        if !sequential {
            self.seek(start)?;
        }

        let mut written = 0usize;
        while written < frames {
            let pos = start + written as u64;

            if pos >= self.carry_start && pos < self.carry_end() {
                let offset = (pos - self.carry_start) as usize;
                let count = (self.carry_len - offset).min(frames - written);
                for (dst, src) in buffers.iter_mut().zip(self.carry.iter()) {
                    dst[written..written + count].copy_from_slice(&src[offset..offset + count]);
                }
                written += count;
                continue;
            }

            if pos < self.carry_start {
                // Gap left by a skipped packet
                let count = ((self.carry_start - pos).min((frames - written) as u64)) as usize;
                for dst in buffers.iter_mut() {
                    dst[written..written + count].fill(0.0);
                }
                written += count;
                continue;
            }

            if self.drained {
                break;
            }
            match self.decode_next(pos) {
                Ok(true) => {}
                Ok(false) => break,
                Err(error) if written > 0 => {
                    self.deferred = Some((pos, error));
                    break;
                }
                Err(error) => return Err(error),
            }
        }

        Ok(written)
    }

    fn reopen(&self) -> Result<Box<dyn SourceAdapter>> {
        Ok(Box::new(SymphoniaSource::open(&self.path)?))
    }

    fn locator(&self) -> Option<&str> {
        Some(&self.path)
    }
}

/// Create a hint from the file extension
fn create_hint_from_path(path: &Path) -> Hint {
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    hint
}
