//! Mel-frequency cepstral coefficients.
//!
//! Frame layout and filterbank follow the common speech-features defaults:
//! 25 ms rectangular windows every 10 ms, 0.97 pre-emphasis, 26 triangular
//! mel filters between 0 Hz and Nyquist, orthonormal DCT-II, a sinusoidal
//! lifter of 22, and c0 replaced by the log frame energy. Input samples are
//! scaled to the signed 16-bit range first, so a model trained on integer
//! recordings sees the same magnitudes.

use std::f64::consts::PI;

const WINDOW_SECONDS: f64 = 0.025;
const STEP_SECONDS: f64 = 0.010;
const MEL_FILTERS: usize = 26;
const MIN_FFT_SIZE: usize = 512;
const PREEMPHASIS: f64 = 0.97;
const CEP_LIFTER: f64 = 22.0;
const PCM_SCALE: f64 = 32_768.0;

/// Fixed-length input to the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(pub Vec<f64>);

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Frame-level MFCC extractor for one sample rate.
#[derive(Debug, Clone)]
pub struct MfccExtractor {
    numcep: usize,
    frame_len: usize,
    frame_step: usize,
    nfft: usize,
    filterbank: Vec<Vec<f64>>,
    lifter: Vec<f64>,
}

impl MfccExtractor {
    pub fn new(sample_rate: u32, numcep: usize) -> Self {
        let rate = f64::from(sample_rate);
        let frame_len = ((WINDOW_SECONDS * rate).round() as usize).max(1);
        let frame_step = ((STEP_SECONDS * rate).round() as usize).max(1);
        let nfft = frame_len.next_power_of_two().max(MIN_FFT_SIZE);
        let numcep = numcep.clamp(1, MEL_FILTERS);
        Self {
            numcep,
            frame_len,
            frame_step,
            nfft,
            filterbank: mel_filterbank(MEL_FILTERS, nfft, rate),
            lifter: lifter_weights(numcep, CEP_LIFTER),
        }
    }

    pub fn numcep(&self) -> usize {
        self.numcep
    }

    /// One row of `numcep` coefficients per frame.
    pub fn frames(&self, samples: &[f32]) -> Vec<Vec<f64>> {
        let emphasized = preemphasize(samples);
        let frame_count = if emphasized.len() <= self.frame_len {
            1
        } else {
            1 + (emphasized.len() - self.frame_len).div_ceil(self.frame_step)
        };

        let mut rows = Vec::with_capacity(frame_count);
        let mut buffer = vec![Complex::default(); self.nfft];
        for frame in 0..frame_count {
            let start = frame * self.frame_step;
            buffer.fill(Complex::default());
            for (slot, sample) in buffer
                .iter_mut()
                .zip(emphasized.iter().skip(start).take(self.frame_len))
            {
                slot.re = *sample;
            }
            fft(&mut buffer);

            let bins = self.nfft / 2 + 1;
            let power: Vec<f64> = buffer[..bins]
                .iter()
                .map(|c| (c.re * c.re + c.im * c.im) / self.nfft as f64)
                .collect();
            let energy = floor_eps(power.iter().sum());

            let log_mel: Vec<f64> = self
                .filterbank
                .iter()
                .map(|filter| {
                    let e: f64 = filter.iter().zip(&power).map(|(w, p)| w * p).sum();
                    floor_eps(e).ln()
                })
                .collect();

            let mut cepstra = dct_ortho(&log_mel, self.numcep);
            for (c, lift) in cepstra.iter_mut().zip(&self.lifter) {
                *c *= lift;
            }
            cepstra[0] = energy.ln();
            rows.push(cepstra);
        }
        rows
    }

    /// Mean of the per-frame coefficients.
    pub fn extract(&self, samples: &[f32]) -> FeatureVector {
        let rows = self.frames(samples);
        let mut mean = vec![0.0; self.numcep];
        for row in &rows {
            for (acc, value) in mean.iter_mut().zip(row) {
                *acc += value;
            }
        }
        let count = rows.len().max(1) as f64;
        for value in &mut mean {
            *value /= count;
        }
        FeatureVector(mean)
    }
}

fn floor_eps(value: f64) -> f64 {
    if value == 0.0 {
        f64::EPSILON
    } else {
        value
    }
}

fn preemphasize(samples: &[f32]) -> Vec<f64> {
    let mut out = Vec::with_capacity(samples.len());
    let mut previous = 0.0;
    for (idx, sample) in samples.iter().enumerate() {
        let current = f64::from(*sample) * PCM_SCALE;
        out.push(if idx == 0 {
            current
        } else {
            current - PREEMPHASIS * previous
        });
        previous = current;
    }
    out
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular filters over `nfft / 2 + 1` power bins.
fn mel_filterbank(filters: usize, nfft: usize, sample_rate: f64) -> Vec<Vec<f64>> {
    let high_mel = hz_to_mel(sample_rate / 2.0);
    let points = filters + 2;
    let bins: Vec<usize> = (0..points)
        .map(|i| {
            let mel = high_mel * i as f64 / (points - 1) as f64;
            ((nfft + 1) as f64 * mel_to_hz(mel) / sample_rate).floor() as usize
        })
        .collect();

    let width = nfft / 2 + 1;
    (0..filters)
        .map(|j| {
            let (left, center, right) = (bins[j], bins[j + 1], bins[j + 2]);
            let mut filter = vec![0.0; width];
            for i in left..center.min(width) {
                filter[i] = (i - left) as f64 / (center - left) as f64;
            }
            for i in center..right.min(width) {
                filter[i] = (right - i) as f64 / (right - center) as f64;
            }
            filter
        })
        .collect()
}

fn lifter_weights(numcep: usize, lifter: f64) -> Vec<f64> {
    (0..numcep)
        .map(|n| 1.0 + (lifter / 2.0) * (PI * n as f64 / lifter).sin())
        .collect()
}

/// First `keep` coefficients of the orthonormal DCT-II of `input`.
fn dct_ortho(input: &[f64], keep: usize) -> Vec<f64> {
    let n = input.len() as f64;
    (0..keep)
        .map(|k| {
            let sum: f64 = input
                .iter()
                .enumerate()
                .map(|(i, x)| x * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos())
                .sum();
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            sum * scale
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
struct Complex {
    re: f64,
    im: f64,
}

/// In-place iterative radix-2 FFT. `data.len()` must be a power of two.
fn fft(data: &mut [Complex]) {
    let n = data.len();
    if n <= 1 {
        return;
    }

    let mut j = 0;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            data.swap(i, j);
        }
    }

    let mut len = 2;
    while len <= n {
        let angle = -2.0 * PI / len as f64;
        let (w_im, w_re) = angle.sin_cos();
        for chunk in data.chunks_mut(len) {
            let (mut cur_re, mut cur_im) = (1.0, 0.0);
            let half = len / 2;
            for k in 0..half {
                let a = chunk[k];
                let b = chunk[k + half];
                let t_re = b.re * cur_re - b.im * cur_im;
                let t_im = b.re * cur_im + b.im * cur_re;
                chunk[k] = Complex {
                    re: a.re + t_re,
                    im: a.im + t_im,
                };
                chunk[k + half] = Complex {
                    re: a.re - t_re,
                    im: a.im - t_im,
                };
                let next_re = cur_re * w_re - cur_im * w_im;
                cur_im = cur_re * w_im + cur_im * w_re;
                cur_re = next_re;
            }
        }
        len <<= 1;
    }
}
