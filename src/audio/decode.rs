//! # WAV Decoding
//!
//! Reads a stored WAV file into an [`AudioClip`]. The recognition backend
//! wants a single mono PCM buffer, so multi-channel audio is downmixed by
//! averaging channels and all bit depths are normalized to 16-bit signed.

use crate::audio::clip::AudioClip;
use crate::error::AppError;
use std::fs::File;
use std::path::Path;
use wav::BitDepth;

/// Decode a WAV file into a mono 16-bit clip.
///
/// Any failure here (unreadable file, truncated header, unsupported data
/// chunk) maps to a `Storage` error: by this point the upload passed
/// validation, so a decode failure is a local I/O problem, not client input
/// the caller can correct field-by-field.
pub fn decode_wav(path: &Path) -> Result<AudioClip, AppError> {
    let mut file = File::open(path)
        .map_err(|e| AppError::Storage(format!("failed to open stored audio: {}", e)))?;

    let (header, data) = wav::read(&mut file)
        .map_err(|e| AppError::Storage(format!("failed to decode WAV data: {}", e)))?;

    let interleaved: Vec<i16> = match data {
        BitDepth::Eight(samples) => samples
            .into_iter()
            .map(|s| ((s as i16) - 128) << 8)
            .collect(),
        BitDepth::Sixteen(samples) => samples,
        BitDepth::TwentyFour(samples) => samples.into_iter().map(|s| (s >> 8) as i16).collect(),
        BitDepth::ThirtyTwoFloat(samples) => samples
            .into_iter()
            .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .collect(),
        BitDepth::Empty => {
            return Err(AppError::Storage("WAV file contains no samples".to_string()));
        }
    };

    let channels = header.channel_count.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        downmix(&interleaved, channels)
    };

    if samples.is_empty() {
        return Err(AppError::Storage("WAV file contains no samples".to_string()));
    }

    tracing::debug!(
        sample_rate = header.sampling_rate,
        channels = header.channel_count,
        samples = samples.len(),
        "Decoded WAV file"
    );

    Ok(AudioClip::new(samples, header.sampling_rate))
}

/// Average interleaved frames down to a single channel.
fn downmix(interleaved: &[i16], channels: usize) -> Vec<i16> {
    interleaved
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wav::Header;

    fn write_wav(dir: &Path, name: &str, channels: u16, rate: u32, samples: Vec<i16>) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        let header = Header::new(wav::WAV_FORMAT_PCM, channels, rate, 16);
        wav::write(header, &BitDepth::Sixteen(samples), &mut file).unwrap();
        path
    }

    #[test]
    fn test_decode_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(dir.path(), "mono.wav", 1, 16000, vec![1, 2, 3, 4]);

        let clip = decode_wav(&path).unwrap();
        assert_eq!(clip.sample_rate, 16000);
        assert_eq!(clip.samples, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_downmixes_stereo() {
        let dir = tempfile::tempdir().unwrap();
        // Frames: (100, 200), (-100, 100)
        let path = write_wav(dir.path(), "stereo.wav", 2, 8000, vec![100, 200, -100, 100]);

        let clip = decode_wav(&path).unwrap();
        assert_eq!(clip.sample_rate, 8000);
        assert_eq!(clip.samples, vec![150, 0]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.wav");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"this is not a wav file").unwrap();

        let err = decode_wav(&path).unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[test]
    fn test_decode_missing_file() {
        let err = decode_wav(Path::new("/nonexistent/clip.wav")).unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }
}
