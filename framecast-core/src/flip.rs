//! Vertical row flip between two distinct buffers.
//!
//! Surfaces hand out pixels origin-at-bottom; most consumers want
//! origin-at-top. Rows move, their contents do not.

use crate::error::ExportError;
use crate::types::Dimensions;

/// Copy `src` into `dst` with row order reversed.
///
/// Row `y` of `dst` receives row `height - 1 - y` of `src`. Both slices
/// must be exactly `width * height * 4` bytes.
pub fn flip_rows(src: &[u8], dst: &mut [u8], dims: Dimensions) -> Result<(), ExportError> {
    let expected = dims.byte_len()?;
    if src.len() != expected {
        return Err(ExportError::BufferMismatch {
            expected,
            actual: src.len(),
        });
    }
    if dst.len() != expected {
        return Err(ExportError::BufferMismatch {
            expected,
            actual: dst.len(),
        });
    }

    let row_len = dims.row_len();
    if row_len == 0 {
        return Ok(());
    }

    for (dst_row, src_row) in dst
        .chunks_exact_mut(row_len)
        .zip(src.chunks_exact(row_len).rev())
    {
        dst_row.copy_from_slice(src_row);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(dims: Dimensions) -> Vec<u8> {
        (0..dims.byte_len().unwrap()).map(|i| i as u8).collect()
    }

    #[test]
    fn rows_are_reversed() {
        let dims = Dimensions::new(2, 3);
        let src = numbered(dims);
        let mut dst = vec![0; src.len()];
        flip_rows(&src, &mut dst, dims).unwrap();

        let row = dims.row_len();
        assert_eq!(&dst[0..row], &src[2 * row..3 * row]);
        assert_eq!(&dst[row..2 * row], &src[row..2 * row]);
        assert_eq!(&dst[2 * row..3 * row], &src[0..row]);
    }

    #[test]
    fn flip_is_an_involution() {
        let dims = Dimensions::new(5, 7);
        let original = numbered(dims);
        let mut once = vec![0; original.len()];
        let mut twice = vec![0; original.len()];

        flip_rows(&original, &mut once, dims).unwrap();
        assert_ne!(once, original);
        flip_rows(&once, &mut twice, dims).unwrap();
        assert_eq!(twice, original);
    }

    #[test]
    fn single_row_is_unchanged() {
        let dims = Dimensions::new(3, 1);
        let src = numbered(dims);
        let mut dst = vec![0; src.len()];
        flip_rows(&src, &mut dst, dims).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn zero_width_is_a_no_op() {
        let mut dst: [u8; 0] = [];
        flip_rows(&[], &mut dst, Dimensions::new(0, 4)).unwrap();
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let dims = Dimensions::new(2, 2);
        let src = vec![0u8; 16];
        let mut short = vec![0u8; 8];
        let err = flip_rows(&src, &mut short, dims).unwrap_err();
        assert!(matches!(
            err,
            ExportError::BufferMismatch {
                expected: 16,
                actual: 8
            }
        ));
    }
}
