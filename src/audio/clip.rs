use byteorder::{LittleEndian, WriteBytesExt};

/// A decoded mono audio buffer ready for the recognition backend.
///
/// ## Representation:
/// - **samples**: 16-bit signed PCM, single channel
/// - **sample_rate**: samples per second (whatever the uploaded file declared)
///
/// Clips are created either by decoding a stored WAV file (real requests) or
/// by [`AudioClip::silence`] (warm-up passes).
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// A trivial valid clip of digital silence.
    ///
    /// Used by the warm-up scheduler to exercise a recognizer handle without
    /// needing any audio file on disk. The backend is expected to report
    /// "unintelligible" for it, which the scheduler treats as success.
    pub fn silence(sample_rate: u32, millis: u32) -> Self {
        let sample_count = (sample_rate as u64 * millis as u64 / 1000) as usize;
        Self {
            samples: vec![0i16; sample_count],
            sample_rate,
        }
    }

    /// Clip length in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Serialize the samples as raw little-endian 16-bit PCM (`audio/l16`),
    /// the body format the recognition backend consumes.
    pub fn to_linear16(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * 2);
        for &sample in &self.samples {
            // Writing into a Vec cannot fail
            bytes
                .write_i16::<LittleEndian>(sample)
                .expect("write to Vec failed");
        }
        bytes
    }
}
