//! Buffer-length reconciliation between a channel and its inputs.
//!
//! Every input buffer covers the same span of time as the output block, but
//! may hold a different number of samples. For an output of length `L` and an
//! input of length `l`, output sample `i` reads input sample:
//!
//! | case | index |
//! |------|-------|
//! | `l == L` | `i` |
//! | `l == 1` | `0` |
//! | otherwise | `floor(i * l / L)` (zero-order hold) |
//!
//! N-ary consumers call [`for_each_sample`]. It classifies the inputs into a
//! bit mask of scalar flags and, when every input either matches the output
//! length or is scalar, runs a loop monomorphized for that mask: the per-input
//! branch is resolved at compile time. With more than three inputs, or when any
//! input needs resampling, a generic cursor loop is used instead.

use core::ops::Range;

/// Largest input count served by the specialized loops.
pub const MAX_SPECIALIZED_INPUTS: usize = 3;

/// Input index read for output index `i`.
#[inline]
pub fn source_index(i: usize, src_len: usize, out_len: usize) -> usize {
    if src_len == out_len {
        i
    } else if src_len == 1 {
        0
    } else {
        // Integer form of floor(i * step) with step = l / L.
        (i * src_len / out_len).min(src_len - 1)
    }
}

/// Bit `k` is set when input `k` holds a single sample.
///
/// Returns `None` when some input neither matches `out_len` nor is scalar,
/// in which case only the generic loop applies.
pub fn scalar_mask(inputs: &[&[f32]], out_len: usize) -> Option<u32> {
    let mut mask = 0;
    for (k, input) in inputs.iter().enumerate() {
        if input.len() == out_len {
            continue;
        }
        if input.len() == 1 && k < 32 {
            mask |= 1 << k;
        } else {
            return None;
        }
    }
    Some(mask)
}

/// Copies `src` into `dst`, broadcasting or resampling as needed.
pub fn reconcile_into(dst: &mut [f32], src: &[f32]) {
    if src.len() == dst.len() {
        dst.copy_from_slice(src);
    } else if src.len() == 1 {
        dst.fill(src[0]);
    } else if src.is_empty() {
        dst.fill(0.0);
    } else {
        let out_len = dst.len();
        for (i, d) in dst.iter_mut().enumerate() {
            *d = src[source_index(i, src.len(), out_len)];
        }
    }
}

/// Calls `f(i, values)` for each output index in `range`, with `values[k]`
/// taken from `inputs[k]` per the reconciliation rules.
///
/// `out_len` is the full output block length (the range may cover only part
/// of it). Empty inputs read as silence.
#[inline]
pub fn for_each_sample<const N: usize, F>(
    range: Range<usize>,
    out_len: usize,
    inputs: [&[f32]; N],
    mut f: F,
) where
    F: FnMut(usize, [f32; N]),
{
    if inputs.iter().any(|input| input.is_empty()) {
        let silent: [&[f32]; N] = core::array::from_fn(|k| {
            if inputs[k].is_empty() {
                &[0.0][..]
            } else {
                inputs[k]
            }
        });
        return generic(range, out_len, silent, &mut f);
    }

    if N > MAX_SPECIALIZED_INPUTS {
        return generic(range, out_len, inputs, &mut f);
    }

    match scalar_mask(&inputs, out_len) {
        Some(0) => specialized::<N, 0, F>(range, inputs, &mut f),
        Some(1) => specialized::<N, 1, F>(range, inputs, &mut f),
        Some(2) => specialized::<N, 2, F>(range, inputs, &mut f),
        Some(3) => specialized::<N, 3, F>(range, inputs, &mut f),
        Some(4) => specialized::<N, 4, F>(range, inputs, &mut f),
        Some(5) => specialized::<N, 5, F>(range, inputs, &mut f),
        Some(6) => specialized::<N, 6, F>(range, inputs, &mut f),
        Some(7) => specialized::<N, 7, F>(range, inputs, &mut f),
        _ => generic(range, out_len, inputs, &mut f),
    }
}

#[inline]
fn specialized<const N: usize, const MASK: u32, F>(
    range: Range<usize>,
    inputs: [&[f32]; N],
    f: &mut F,
) where
    F: FnMut(usize, [f32; N]),
{
    // Scalars are hoisted out of the loop.
    let scalars: [f32; N] = core::array::from_fn(|k| inputs[k][0]);
    for i in range {
        let values = core::array::from_fn(|k| {
            if MASK & (1 << k) != 0 {
                scalars[k]
            } else {
                inputs[k][i]
            }
        });
        f(i, values);
    }
}

fn generic<const N: usize, F>(range: Range<usize>, out_len: usize, inputs: [&[f32]; N], f: &mut F)
where
    F: FnMut(usize, [f32; N]),
{
    for i in range {
        let values = core::array::from_fn(|k| {
            let input = inputs[k];
            input[source_index(i, input.len(), out_len)]
        });
        f(i, values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_length_copies() {
        let mut dst = [0.0; 3];
        reconcile_into(&mut dst, &[1.0, 2.0, 3.0]);
        assert_eq!(dst, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_scalar_broadcasts() {
        let mut dst = [0.0; 4];
        reconcile_into(&mut dst, &[0.5]);
        assert_eq!(dst, [0.5; 4]);
    }

    #[test]
    fn test_shorter_input_holds_previous_sample() {
        let mut dst = [0.0; 4];
        reconcile_into(&mut dst, &[10.0, 11.0]);
        assert_eq!(dst, [10.0, 10.0, 11.0, 11.0]);
    }

    #[test]
    fn test_longer_input_is_decimated() {
        let mut dst = [0.0; 2];
        reconcile_into(&mut dst, &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(dst, [0.0, 2.0]);
    }

    #[test]
    fn test_uneven_ratio_never_reads_past_end() {
        let src: Vec<f32> = (0..3).map(|v| v as f32).collect();
        let mut dst = [0.0; 7];
        reconcile_into(&mut dst, &src);
        assert_eq!(dst, [0.0, 0.0, 0.0, 1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_mask_classifies_inputs() {
        let full = [0.0; 4];
        let one = [1.0];
        let half = [0.0; 2];
        assert_eq!(scalar_mask(&[&full[..], &full[..]], 4), Some(0));
        assert_eq!(scalar_mask(&[&one[..], &full[..], &one[..]], 4), Some(0b101));
        assert_eq!(scalar_mask(&[&full[..], &half[..]], 4), None);
    }

    #[test]
    fn test_for_each_sample_mixes_scalar_and_block_inputs() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [10.0];
        let c = [100.0, 200.0];
        let mut out = [0.0; 4];
        for_each_sample(0..4, 4, [&a[..], &b[..], &c[..]], |i, [x, y, z]| {
            out[i] = x + y + z;
        });
        assert_eq!(out, [111.0, 112.0, 213.0, 214.0]);
    }

    #[test]
    fn test_for_each_sample_every_mask_matches_generic() {
        let block = [1.0, 2.0, 3.0];
        let scalar = [5.0];
        for mask in 0..8u32 {
            let inputs: [&[f32]; 3] = core::array::from_fn(|k| {
                if mask & (1 << k) != 0 {
                    &scalar[..]
                } else {
                    &block[..]
                }
            });
            let mut fast = [0.0; 3];
            for_each_sample(0..3, 3, inputs, |i, v| fast[i] = v[0] * 100.0 + v[1] * 10.0 + v[2]);
            let mut slow = [0.0; 3];
            generic(0..3, 3, inputs, &mut |i, v: [f32; 3]| {
                slow[i] = v[0] * 100.0 + v[1] * 10.0 + v[2];
            });
            assert_eq!(fast, slow, "mask {mask:03b}");
        }
    }

    #[test]
    fn test_for_each_sample_honours_sub_range() {
        let a = [0.0, 1.0, 2.0, 3.0];
        let mut seen = Vec::new();
        for_each_sample(2..4, 4, [&a[..]], |i, [x]| seen.push((i, x)));
        assert_eq!(seen, vec![(2, 2.0), (3, 3.0)]);
    }

    #[test]
    fn test_wide_consumers_use_generic_loop() {
        let a = [1.0, 1.0];
        let mut sum = [0.0; 2];
        for_each_sample(0..2, 2, [&a[..]; 5], |i, v| sum[i] = v.iter().sum());
        assert_eq!(sum, [5.0, 5.0]);
    }

    #[test]
    fn test_empty_input_reads_silence() {
        let a = [1.0, 2.0];
        let mut out = [9.0; 2];
        for_each_sample(0..2, 2, [&a[..], &[][..]], |i, [x, y]| out[i] = x + y);
        assert_eq!(out, [1.0, 2.0]);
    }
}
