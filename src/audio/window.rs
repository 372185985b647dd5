//! Fixed-size circular window of mono samples

/// Circular analysis window.
///
/// Written one sample at a time from the audio thread. A push that moves the
/// write position from the last slot back to zero completes a window.
#[derive(Debug, Clone)]
pub struct AnalysisWindow {
    samples: Vec<f32>,
    write_pos: usize,
}

impl AnalysisWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "AnalysisWindow capacity must be greater than zero");
        Self {
            samples: vec![0.0; capacity],
            write_pos: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Store one sample. Returns `true` when this push wrapped the window.
    #[inline]
    pub fn push(&mut self, sample: f32) -> bool {
        self.samples[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.capacity();
        self.write_pos == 0
    }

    /// Copy the window into `dst`, oldest sample first.
    ///
    /// `dst` must be exactly `capacity()` long.
    pub fn copy_chronological(&self, dst: &mut [f32]) {
        debug_assert_eq!(dst.len(), self.capacity());
        let (newer, older) = self.samples.split_at(self.write_pos);
        dst[..older.len()].copy_from_slice(older);
        dst[older.len()..].copy_from_slice(newer);
    }

    /// Zero all samples and rewind the write position.
    pub fn clear(&mut self) {
        self.samples.fill(0.0);
        self.write_pos = 0;
    }
}
