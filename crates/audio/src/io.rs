use std::fs::File;
use std::path::Path;

use crest_domain::{AudioFormat, SampleFormat};
use symphonia::core::audio::{AudioBuffer as DecodedBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{CodecParameters, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracing::{debug, warn};

use crate::buffer::AudioBuffer;
use crate::encode;
use crate::error::CodecError;

/// Boundary to whatever reads and writes audio containers.
pub trait AudioCodec {
    fn decode(&self, path: &Path) -> Result<AudioBuffer, CodecError>;

    /// Replaces the file at `path` with `buffer`, in the container its extension names.
    fn encode(&self, buffer: &AudioBuffer, path: &Path) -> Result<(), CodecError>;
}

/// Decodes with symphonia, writes WAV with hound and MP3 with LAME.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCodec;

impl AudioCodec for DefaultCodec {
    fn decode(&self, path: &Path) -> Result<AudioBuffer, CodecError> {
        AudioDecoder::open(path)
    }

    fn encode(&self, buffer: &AudioBuffer, path: &Path) -> Result<(), CodecError> {
        match AudioFormat::from_path(path) {
            Some(AudioFormat::Wav) => encode::replace_with_wav(buffer, path),
            Some(AudioFormat::Mp3) => encode::replace_with_mp3(buffer, path),
            None => Err(CodecError::Write {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "cannot infer container from extension",
                ),
            }),
        }
    }
}

pub struct AudioDecoder;

impl AudioDecoder {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<AudioBuffer, CodecError> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref).map_err(|source| CodecError::Open {
            path: path_ref.to_path_buf(),
            source,
        })?;
        let decode_err = |source: SymphError| CodecError::Decode {
            path: path_ref.to_path_buf(),
            source,
        };
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = path_ref.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(decode_err)?;
        let mut format = probed.format;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| CodecError::NoTrack {
                path: path_ref.to_path_buf(),
            })?;
        let track_id = track.id;
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(decode_err)?;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44_100);
        let mut channels = track.codec_params.channels.map(|c| c.count() as u16);
        let declared = declared_format(&track.codec_params);
        let mut sample_format: Option<SampleFormat> = None;
        let mut samples = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(err) => return Err(decode_err(err)),
            };
            if packet.track_id() != track_id {
                continue;
            }
            match decoder.decode(&packet) {
                Ok(decoded) => {
                    channels.get_or_insert(decoded.spec().channels.count() as u16);
                    let packet_format = append_interleaved(&decoded, &mut samples).map_err(
                        |reason| CodecError::UnsupportedSamples {
                            path: path_ref.to_path_buf(),
                            reason,
                        },
                    )?;
                    match sample_format {
                        None => sample_format = Some(packet_format),
                        Some(existing) if existing != packet_format => {
                            return Err(CodecError::UnsupportedSamples {
                                path: path_ref.to_path_buf(),
                                reason: format!(
                                    "sample format changed from {existing:?} to {packet_format:?}"
                                ),
                            });
                        }
                        Some(_) => {}
                    }
                }
                Err(SymphError::DecodeError(reason)) => {
                    // skip undecodable packet
                    warn!(path = ?path_ref, reason, "skipping corrupt packet");
                }
                Err(err) => return Err(decode_err(err)),
            }
        }

        let sample_format = sample_format.unwrap_or(declared);
        let channels = channels.unwrap_or(1);
        debug!(
            path = ?path_ref,
            sample_rate,
            channels,
            ?sample_format,
            sample_count = samples.len(),
            "decoded audio"
        );
        Ok(AudioBuffer::new(sample_rate, channels, sample_format, samples))
    }
}

/// Format to assume when the stream yields no packets to inspect.
fn declared_format(params: &CodecParameters) -> SampleFormat {
    use symphonia::core::sample::SampleFormat as Declared;
    match params.sample_format {
        Some(Declared::F32 | Declared::F64) => SampleFormat::F32,
        _ => params
            .bits_per_sample
            .and_then(|bits| SampleFormat::from_int_bits(bits).ok())
            .unwrap_or(SampleFormat::S16),
    }
}

/// Appends one decoded packet frame by frame, scaled to the integer domain of its format.
fn append_interleaved(
    decoded: &AudioBufferRef<'_>,
    out: &mut Vec<f64>,
) -> Result<SampleFormat, String> {
    match decoded {
        AudioBufferRef::U8(buf) => {
            interleave(&**buf, out, |s| f64::from(s) - 128.0);
            Ok(SampleFormat::U8)
        }
        AudioBufferRef::S8(buf) => {
            interleave(&**buf, out, f64::from);
            Ok(SampleFormat::U8)
        }
        AudioBufferRef::S16(buf) => {
            interleave(&**buf, out, f64::from);
            Ok(SampleFormat::S16)
        }
        AudioBufferRef::S24(buf) => {
            interleave(&**buf, out, |s| f64::from(s.inner()));
            Ok(SampleFormat::S24)
        }
        AudioBufferRef::S32(buf) => {
            interleave(&**buf, out, f64::from);
            Ok(SampleFormat::S32)
        }
        AudioBufferRef::F32(buf) => {
            interleave(&**buf, out, f64::from);
            Ok(SampleFormat::F32)
        }
        AudioBufferRef::F64(buf) => {
            interleave(&**buf, out, |s| s);
            Ok(SampleFormat::F32)
        }
        AudioBufferRef::U16(_) | AudioBufferRef::U24(_) | AudioBufferRef::U32(_) => {
            Err("unsigned samples wider than 8 bits".to_string())
        }
    }
}

fn interleave<S: Sample>(
    buf: &DecodedBuffer<S>,
    out: &mut Vec<f64>,
    to_amplitude: impl Fn(S) -> f64,
) {
    let channels = buf.spec().channels.count();
    let frames = buf.frames();
    out.reserve(frames * channels);
    for frame in 0..frames {
        for ch in 0..channels {
            out.push(to_amplitude(buf.chan(ch)[frame]));
        }
    }
}
