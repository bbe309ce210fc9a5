//! The Hilbert curve index of a point, after J. Skilling, "Programming the Hilbert curve" (2004).

/// The Hilbert index of `coordinates`, each of which must be less than `2^bits`.
///
/// `coordinates.len() * bits` must not exceed 64.
pub(crate) fn hilbert_index(coordinates: &[u64], bits: u32) -> u64 {
    let n = coordinates.len();
    if n == 0 || bits == 0 {
        return 0;
    }
    let mut x = coordinates.to_vec();

    // inverse undo excess work
    let m = 1u64 << (bits - 1);
    let mut q = m;
    while q > 1 {
        let p = q - 1;
        for i in 0..n {
            if x[i] & q == 0 {
                let t = (x[0] ^ x[i]) & p;
                x[0] ^= t;
                x[i] ^= t;
            } else {
                x[0] ^= p;
            }
        }
        q >>= 1;
    }

    // gray encode
    for i in 1..n {
        x[i] ^= x[i - 1];
    }
    let mut t = 0;
    let mut q = m;
    while q > 1 {
        if x[n - 1] & q != 0 {
            t ^= q - 1;
        }
        q >>= 1;
    }
    for xi in &mut x {
        *xi ^= t;
    }

    // interleave the transposed bits, most significant first
    let mut index = 0u64;
    for bit in (0..bits).rev() {
        for xi in &x {
            index = (index << 1) | ((xi >> bit) & 1);
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hilbert_2d_order_1() {
        assert_eq!(hilbert_index(&[0, 0], 1), 0);
        assert_eq!(hilbert_index(&[0, 1], 1), 1);
        assert_eq!(hilbert_index(&[1, 1], 1), 2);
        assert_eq!(hilbert_index(&[1, 0], 1), 3);
    }

    #[test]
    fn hilbert_2d_is_a_curve() {
        // every index is visited once and consecutive indices are adjacent cells
        let bits = 3;
        let side = 1u64 << bits;
        let mut cells = vec![None; (side * side) as usize];
        for x in 0..side {
            for y in 0..side {
                let index = hilbert_index(&[x, y], bits) as usize;
                assert!(cells[index].is_none());
                cells[index] = Some((x, y));
            }
        }
        let cells: Vec<_> = cells.into_iter().map(Option::unwrap).collect();
        for pair in cells.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];
            assert_eq!(x0.abs_diff(x1) + y0.abs_diff(y1), 1);
        }
    }
}
