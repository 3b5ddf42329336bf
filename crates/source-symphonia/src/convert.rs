// Decoded buffer to planar f32

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::conv::IntoSample;
use symphonia::core::sample::Sample;

/// Replace `planar` with the frames of `buffer`, one Vec per channel.
/// Channels beyond `planar.len()` are ignored.
pub(crate) fn copy_planar(buffer: &AudioBufferRef, planar: &mut [Vec<f32>]) -> usize {
    match buffer {
        AudioBufferRef::F32(buf) => copy_channels(buf, planar),
        AudioBufferRef::F64(buf) => copy_channels(buf, planar),
        AudioBufferRef::U8(buf) => copy_channels(buf, planar),
        AudioBufferRef::U16(buf) => copy_channels(buf, planar),
        AudioBufferRef::U24(buf) => copy_channels(buf, planar),
        AudioBufferRef::U32(buf) => copy_channels(buf, planar),
        AudioBufferRef::S8(buf) => copy_channels(buf, planar),
        AudioBufferRef::S16(buf) => copy_channels(buf, planar),
        AudioBufferRef::S24(buf) => copy_channels(buf, planar),
        AudioBufferRef::S32(buf) => copy_channels(buf, planar),
    }
}

fn copy_channels<S>(buf: &AudioBuffer<S>, planar: &mut [Vec<f32>]) -> usize
where
    S: Sample + IntoSample<f32>,
{
    let frames = buf.frames();
    let channels = buf.spec().channels.count();

    for (ch, dst) in planar.iter_mut().enumerate() {
        dst.clear();
        if ch < channels {
            dst.extend(buf.chan(ch).iter().map(|&s| s.into_sample()));
        } else {
            // Layout changed mid-stream; keep the frame count consistent
            dst.resize(frames, 0.0);
        }
    }
    frames
}
