/// Average interleaved frames down to mono, converting each sample with `convert`.
pub(super) fn append_downmixed_samples<T, F>(
    buf: &mut Vec<f32>,
    data: &[T],
    channels: usize,
    mut convert: F,
) where
    T: Copy,
    F: FnMut(T) -> f32,
{
    if channels <= 1 {
        buf.extend(data.iter().copied().map(&mut convert));
        return;
    }

    let mut acc = 0.0f32;
    let mut count = 0usize;
    for sample in data.iter().copied() {
        acc += convert(sample);
        count += 1;
        if count == channels {
            buf.push(acc / channels as f32);
            acc = 0.0;
            count = 0;
        }
    }
    // A trailing partial frame is averaged over what arrived.
    if count > 0 {
        buf.push(acc / count as f32);
    }
}

/// Scale an `i16` sample into `[-1.0, 1.0)`.
pub(super) fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32_768.0
}

/// Scale an offset-binary `u16` sample into `[-1.0, 1.0)`.
pub(super) fn u16_to_f32(sample: u16) -> f32 {
    (sample as f32 - 32_768.0) / 32_768.0
}
