pub mod buffer;
pub mod dsp;
pub mod encode;
pub mod error;
pub mod io;

pub use buffer::AudioBuffer;
pub use dsp::{apply_gain, measure_peak_dbfs};
pub use error::CodecError;
pub use io::{AudioCodec, AudioDecoder, DefaultCodec};
