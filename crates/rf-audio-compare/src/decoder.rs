//! Container readers
//!
//! - WAV (via hound): streamed frame by frame, rewound by seeking
//! - AIFF (via symphonia): decoded up front into a [`MemoryStream`]

use crate::quantize::BitDepth;
use crate::stream::{MemoryStream, SampleStream};
use crate::{CompareError, Result};

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

// ═══════════════════════════════════════════════════════════════════════════════
// WAV
// ═══════════════════════════════════════════════════════════════════════════════

/// Streaming WAV reader
pub struct WavFileStream {
    reader: hound::WavReader<BufReader<File>>,
    channels: usize,
    bit_depth: BitDepth,
    sample_rate: u32,
    position: u64,
    num_frames: u64,
}

impl WavFileStream {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = hound::WavReader::open(path)?;
        let spec = reader.spec();

        if spec.sample_format != hound::SampleFormat::Int {
            return Err(CompareError::Decode(format!(
                "{}: floating-point WAV is not supported",
                path.display()
            )));
        }

        let bit_depth = BitDepth::from_bits(spec.bits_per_sample as u32)?;
        let channels = check_channels(path, spec.channels as usize)?;
        let num_frames = reader.duration() as u64;

        Ok(Self {
            reader,
            channels,
            bit_depth,
            sample_rate: spec.sample_rate,
            position: 0,
            num_frames,
        })
    }
}

impl SampleStream for WavFileStream {
    fn channels(&self) -> usize {
        self.channels
    }

    fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_frame(&self) -> u64 {
        self.position
    }

    fn num_frames(&self) -> u64 {
        self.num_frames
    }

    fn read_frames(&mut self, buffer: &mut [f64]) -> Result<usize> {
        let want = buffer.len() / self.channels * self.channels;
        let scale = self.bit_depth.quantum();

        let mut count = 0;
        for (slot, sample) in buffer[..want].iter_mut().zip(self.reader.samples::<i32>()) {
            *slot = sample? as f64 * scale;
            count += 1;
        }

        let frames = count / self.channels;
        self.position += frames as u64;
        Ok(frames)
    }

    fn rewind(&mut self) -> Result<()> {
        self.reader.seek(0)?;
        self.position = 0;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// AIFF
// ═══════════════════════════════════════════════════════════════════════════════

/// Decode an AIFF file into memory
pub fn decode_aiff(path: &Path) -> Result<MemoryStream> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("aiff");

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| decode_error(path, e))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| CompareError::Decode(format!("{}: no audio track", path.display())))?;

    let sample_rate = track.codec_params.sample_rate.ok_or_else(|| {
        CompareError::Decode(format!("{}: unknown sample rate", path.display()))
    })?;

    let channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .ok_or_else(|| CompareError::Decode(format!("{}: unknown channels", path.display())))?;
    let channels = check_channels(path, channels)?;

    let bits = track.codec_params.bits_per_sample.ok_or_else(|| {
        CompareError::Decode(format!("{}: unknown sample size", path.display()))
    })?;
    let bit_depth = BitDepth::from_bits(bits)?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| decode_error(path, e))?;

    let track_id = track.id;
    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(e) => return Err(decode_error(path, e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet).map_err(|e| decode_error(path, e))?;
        append_interleaved(&decoded, &mut samples);
    }

    log::debug!(
        "Decoded {}: {} frames, {} ch, {}, {} Hz",
        path.display(),
        samples.len() / channels,
        channels,
        bit_depth,
        sample_rate
    );

    Ok(MemoryStream::new(samples, channels, bit_depth, sample_rate))
}

fn decode_error(path: &Path, error: SymphoniaError) -> CompareError {
    CompareError::Decode(format!("{}: {}", path.display(), error))
}

fn check_channels(path: &Path, channels: usize) -> Result<usize> {
    if (1..=2).contains(&channels) {
        Ok(channels)
    } else {
        Err(CompareError::Decode(format!(
            "{}: {} channels (only mono and stereo are supported)",
            path.display(),
            channels
        )))
    }
}

/// Append a decoded buffer to interleaved normalized samples
fn append_interleaved(buffer: &AudioBufferRef, out: &mut Vec<f64>) {
    match buffer {
        AudioBufferRef::S8(buf) => interleave(&**buf, out, |s| s as f64 / 128.0),
        AudioBufferRef::S16(buf) => interleave(&**buf, out, |s| s as f64 / 32768.0),
        AudioBufferRef::S24(buf) => interleave(&**buf, out, |s| s.inner() as f64 / 8388608.0),
        AudioBufferRef::S32(buf) => interleave(&**buf, out, |s| s as f64 / 2147483648.0),
        AudioBufferRef::U8(buf) => interleave(&**buf, out, |s| (s as f64 - 128.0) / 128.0),
        AudioBufferRef::U16(buf) => interleave(&**buf, out, |s| (s as f64 - 32768.0) / 32768.0),
        AudioBufferRef::U24(buf) => {
            interleave(&**buf, out, |s| (s.inner() as f64 - 8388608.0) / 8388608.0)
        }
        AudioBufferRef::U32(buf) => {
            interleave(&**buf, out, |s| (s as f64 - 2147483648.0) / 2147483648.0)
        }
        AudioBufferRef::F32(buf) => interleave(&**buf, out, |s| s as f64),
        AudioBufferRef::F64(buf) => interleave(&**buf, out, |s| s),
    }
}

fn interleave<S: Sample>(buffer: &AudioBuffer<S>, out: &mut Vec<f64>, convert: impl Fn(S) -> f64) {
    let channels = buffer.spec().channels.count();
    out.reserve(buffer.frames() * channels);
    for frame in 0..buffer.frames() {
        for ch in 0..channels {
            out.push(convert(buffer.chan(ch)[frame]));
        }
    }
}
