use std::{fs::File, io::ErrorKind, path::Path};

use anyhow::{bail, Context, Result};
use hound::WavWriter;
use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error as SymphoniaError,
    formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

use crate::types::AudioData;

/// Decode an MP3/WAV file into interleaved f32 samples.
pub fn read_audio<P: AsRef<Path>>(path: P) -> Result<AudioData> {
    let path: &Path = path.as_ref();

    let file: File =
        File::open(path).with_context(|| format!("Failed to open audio file: {:?}", path))?;

    let mss: MediaSourceStream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint: Hint = Hint::new();

    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("Unrecognised audio format: {:?}", path))?;

    let mut format = probed.format;
    let track = format.default_track().context("No default track found")?;
    let track_id = track.id;

    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate: u32 = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels: u16 = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read packet from {:?}", path))
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet in {:?}: {}", path, e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        sample_rate = decoded.spec().rate;
        channels = decoded.spec().channels.count() as u16;

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);

        samples.extend_from_slice(buffer.samples());
    }

    if sample_rate == 0 || channels == 0 {
        bail!("Could not determine sample format of {:?}", path);
    }

    debug!(
        "Read audio {:?}: sample_rate={}, channels={}, samples={}",
        path,
        sample_rate,
        channels,
        samples.len()
    );

    Ok(AudioData {
        samples,
        sample_rate,
        channels,
    })
}

/// Write 16-bit PCM WAV.
pub fn write_audio<P: AsRef<Path>>(path: P, audio: &AudioData) -> Result<()> {
    let path = path.as_ref();
    let spec = hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {:?}", path))?;
    for sample in &audio.samples {
        let s = (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        writer.write_sample(s)?;
    }

    writer.finalize()?;
    debug!("Wrote {} frames to {:?}", audio.frames(), path);
    Ok(())
}
