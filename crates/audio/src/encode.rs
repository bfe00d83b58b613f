use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use crest_domain::SampleFormat;
use hound::{WavSpec, WavWriter};
use mp3lame_encoder::{max_required_buffer_size, Bitrate, Builder, DualPcm, FlushNoGap, Quality};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::buffer::AudioBuffer;
use crate::error::CodecError;

pub fn wav_spec(buffer: &AudioBuffer) -> WavSpec {
    let format = buffer.format();
    WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: format.bits_per_sample(),
        sample_format: if format.is_float() {
            hound::SampleFormat::Float
        } else {
            hound::SampleFormat::Int
        },
    }
}

/// Writes `buffer` as WAV over `path`. See [`replace_atomically`].
pub fn replace_with_wav(buffer: &AudioBuffer, path: &Path) -> Result<(), CodecError> {
    let encode_err = |source: hound::Error| CodecError::Encode {
        path: path.to_path_buf(),
        source,
    };
    replace_atomically(path, |file| {
        let mut writer =
            WavWriter::new(BufWriter::new(file), wav_spec(buffer)).map_err(encode_err)?;
        write_samples(&mut writer, buffer).map_err(encode_err)?;
        writer.finalize().map_err(encode_err)
    })?;
    debug!(?path, frames = buffer.frames(), "replaced wav");
    Ok(())
}

/// Writes `buffer` as a 192 kbps MP3 over `path`. See [`replace_atomically`].
pub fn replace_with_mp3(buffer: &AudioBuffer, path: &Path) -> Result<(), CodecError> {
    let mp3 = encode_mp3(buffer).map_err(|reason| CodecError::Mp3 {
        path: path.to_path_buf(),
        reason,
    })?;
    replace_atomically(path, |file| {
        file.write_all(&mp3).map_err(|source| CodecError::Write {
            path: path.to_path_buf(),
            source,
        })
    })?;
    debug!(?path, frames = buffer.frames(), bytes = mp3.len(), "replaced mp3");
    Ok(())
}

/// Runs `write` against a temporary file next to `path`, gives it the original's
/// permissions, then renames it over `path`. On any error the original is left as it was.
pub fn replace_atomically<F>(path: &Path, write: F) -> Result<(), CodecError>
where
    F: FnOnce(&mut File) -> Result<(), CodecError>,
{
    let write_err = |source: std::io::Error| CodecError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir).map_err(write_err)?;
    write(staged.as_file_mut())?;
    staged.as_file_mut().flush().map_err(write_err)?;

    if let Ok(metadata) = fs::metadata(path) {
        staged
            .as_file()
            .set_permissions(metadata.permissions())
            .map_err(write_err)?;
    }
    staged.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}

/// LAME wants at least this much room for the final frames.
const MP3_FLUSH_RESERVE: usize = 7200;

fn encode_mp3(buffer: &AudioBuffer) -> Result<Vec<u8>, String> {
    let channels = buffer.channels();
    if !(1..=2).contains(&channels) {
        return Err(format!("{channels} channels cannot be written as MP3"));
    }
    let mut builder = Builder::new().ok_or("failed to allocate a LAME encoder")?;
    builder.set_num_channels(channels as u8).map_err(lame_err)?;
    builder.set_sample_rate(buffer.sample_rate()).map_err(lame_err)?;
    builder.set_brate(Bitrate::Kbps192).map_err(lame_err)?;
    builder.set_quality(Quality::Best).map_err(lame_err)?;
    let mut encoder = builder.build().map_err(lame_err)?;

    let (left, right) = split_pcm16(buffer);
    let mut mp3 = Vec::with_capacity(max_required_buffer_size(left.len()));
    let input = DualPcm {
        left: &left,
        right: &right,
    };
    let written = encoder
        .encode(input, mp3.spare_capacity_mut())
        .map_err(lame_err)?;
    // SAFETY: the encoder initialised the first `written` bytes of spare capacity.
    unsafe { mp3.set_len(written) };

    mp3.reserve(MP3_FLUSH_RESERVE);
    let written = encoder
        .flush::<FlushNoGap>(mp3.spare_capacity_mut())
        .map_err(lame_err)?;
    // SAFETY: as above, for the flushed tail.
    unsafe { mp3.set_len(mp3.len() + written) };
    Ok(mp3)
}

fn lame_err<E: fmt::Debug>(err: E) -> String {
    format!("LAME error: {err:?}")
}

/// Splits interleaved samples into 16-bit left/right planes, saturating at full scale.
/// Mono fills both planes with the same channel.
fn split_pcm16(buffer: &AudioBuffer) -> (Vec<i16>, Vec<i16>) {
    let scale = 32768.0 / buffer.max_possible_amplitude();
    let to_pcm = |sample: f64| quantize(sample * scale, 32768.0) as i16;
    let frames = buffer.frames();
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);
    if buffer.channels() == 1 {
        left.extend(buffer.samples().iter().map(|&s| to_pcm(s)));
        right.clone_from(&left);
    } else {
        for frame in buffer.samples().chunks_exact(2) {
            left.push(to_pcm(frame[0]));
            right.push(to_pcm(frame[1]));
        }
    }
    (left, right)
}

fn write_samples<W: Write + Seek>(
    writer: &mut WavWriter<W>,
    buffer: &AudioBuffer,
) -> hound::Result<()> {
    let format = buffer.format();
    let full_scale = format.max_amplitude();
    for &sample in buffer.samples() {
        match format {
            SampleFormat::F32 => writer.write_sample(sample as f32)?,
            SampleFormat::U8 => writer.write_sample(quantize(sample, full_scale) as i8)?,
            SampleFormat::S16 => writer.write_sample(quantize(sample, full_scale) as i16)?,
            SampleFormat::S24 | SampleFormat::S32 => {
                writer.write_sample(quantize(sample, full_scale) as i32)?
            }
        }
    }
    Ok(())
}

/// Rounds to the nearest code, saturating at `[-full_scale, full_scale - 1]`.
fn quantize(sample: f64, full_scale: f64) -> i64 {
    sample.round().clamp(-full_scale, full_scale - 1.0) as i64
}
