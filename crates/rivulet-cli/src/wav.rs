//! WAV output.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;

/// Spec for `channels` interleaved channels. 32 bits selects float samples,
/// anything else integer PCM.
pub fn spec(channels: u16, sample_rate: u32, bits_per_sample: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample,
        sample_format: if bits_per_sample == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    }
}

/// Writes interleaved `samples`, clamping integer formats to full scale.
pub fn write_wav(path: &Path, samples: &[f32], spec: WavSpec) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec)?;

    if spec.sample_format == SampleFormat::Float {
        for &sample in samples {
            writer.write_sample(sample)?;
        }
    } else {
        let max_val = (1i32 << (spec.bits_per_sample - 1)) as f32;
        for &sample in samples {
            let int_sample = (sample * max_val).clamp(-max_val, max_val - 1.0) as i32;
            writer.write_sample(int_sample)?;
        }
    }

    writer.finalize()
}
