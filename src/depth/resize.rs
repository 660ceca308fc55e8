use ndarray::{Array2, ArrayView2};

/// Keys cubic convolution coefficient
const CUBIC_A: f32 = -0.75;

/// Source taps and weights for one output coordinate
struct Taps {
    index: [usize; 4],
    weight: [f32; 4],
}

fn cubic_near(x: f32) -> f32 {
    ((CUBIC_A + 2.0) * x - (CUBIC_A + 3.0)) * x * x + 1.0
}

fn cubic_far(x: f32) -> f32 {
    ((CUBIC_A * x - 5.0 * CUBIC_A) * x + 8.0 * CUBIC_A) * x - 4.0 * CUBIC_A
}

/// Half-pixel-centre mapping: corners are not aligned, so output pixel `i`
/// samples the source at `(i + 0.5) * in / out - 0.5`. Taps falling outside
/// the source are clamped to the border sample.
fn taps(in_len: usize, out_len: usize) -> Vec<Taps> {
    let scale = in_len as f32 / out_len as f32;
    let last = in_len as isize - 1;

    (0..out_len)
        .map(|i| {
            let src = scale * (i as f32 + 0.5) - 0.5;
            let base = src.floor();
            let t = src - base;
            let base = base as isize;

            let mut index = [0usize; 4];
            for (k, slot) in index.iter_mut().enumerate() {
                *slot = (base - 1 + k as isize).clamp(0, last) as usize;
            }

            Taps {
                index,
                weight: [
                    cubic_far(t + 1.0),
                    cubic_near(t),
                    cubic_near(1.0 - t),
                    cubic_far(2.0 - t),
                ],
            }
        })
        .collect()
}

/// Resize a 2-D field with bicubic interpolation, corners not aligned
///
/// Works on raw `f32` depth rather than through `imageops`, which only
/// resamples integer-backed images and uses a different cubic kernel.
///
/// Separable: a horizontal pass over every source row, then a vertical pass.
/// Returns an `(out_h, out_w)` array; an empty source or target yields zeros.
pub fn bicubic(src: ArrayView2<'_, f32>, out_h: usize, out_w: usize) -> Array2<f32> {
    let (in_h, in_w) = src.dim();
    if in_h == 0 || in_w == 0 || out_h == 0 || out_w == 0 {
        return Array2::zeros((out_h, out_w));
    }
    if (in_h, in_w) == (out_h, out_w) {
        return src.to_owned();
    }

    let _span = tracing::debug_span!("bicubic_resize", in_h, in_w, out_h, out_w).entered();

    let cols = taps(in_w, out_w);
    let rows = taps(in_h, out_h);

    let horizontal: Array2<f32> = Array2::from_shape_fn((in_h, out_w), |(y, x)| {
        let tap = &cols[x];
        (0..4).map(|k| src[[y, tap.index[k]]] * tap.weight[k]).sum::<f32>()
    });

    Array2::from_shape_fn((out_h, out_w), |(y, x)| {
        let tap = &rows[y];
        (0..4)
            .map(|k| horizontal[[tap.index[k], x]] * tap.weight[k])
            .sum::<f32>()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn weights_sum_to_one() {
        for tap in taps(7, 19).iter().chain(taps(19, 7).iter()) {
            let total: f32 = tap.weight.iter().sum();
            assert!((total - 1.0).abs() < 1e-5, "weights summed to {total}");
        }
    }

    #[test]
    fn same_size_is_identity() {
        let src = array![[1.0f32, 2.0], [3.0, 4.0]];
        assert_eq!(bicubic(src.view(), 2, 2), src);
    }

    #[test]
    fn constant_field_stays_constant() {
        let src = Array2::from_elem((4, 6), 3.25f32);
        let out = bicubic(src.view(), 15, 11);
        assert_eq!(out.dim(), (15, 11));
        assert!(out.iter().all(|&v| (v - 3.25).abs() < 1e-4));
    }

    #[test]
    fn doubling_samples_at_quarter_offsets() {
        let src = array![[0.0f32, 1.0, 2.0, 3.0]];
        let out = bicubic(src.view(), 1, 8);
        assert_eq!(out.dim(), (1, 8));
        // x=3 samples source 1.25, x=4 samples 1.75; a = -0.75 overshoots a
        // pure ramp slightly, symmetrically about the midpoint.
        assert!((out[[0, 3]] - 1.296875).abs() < 1e-5, "got {}", out[[0, 3]]);
        assert!((out[[0, 4]] - 1.703125).abs() < 1e-5, "got {}", out[[0, 4]]);
    }

    #[test]
    fn upscales_to_requested_shape() {
        let src = Array2::from_shape_fn((3, 3), |(r, c)| (r * 3 + c) as f32);
        let out = bicubic(src.view(), 480, 640);
        assert_eq!(out.dim(), (480, 640));
    }

    #[test]
    fn empty_target_is_empty() {
        let src = array![[1.0f32]];
        assert_eq!(bicubic(src.view(), 0, 5).dim(), (0, 5));
    }
}
