//! Strided GEMM used by the tape's matrix-vector node.
//!
//! One kernel covers all three products the evaluator needs, by choosing strides:
//! - forward `y = W x`: `W` as `(m, k)` with row stride `k`
//! - backward `dx += W^T dy`: the same buffer read with swapped strides
//! - backward `dW += dy x^T`: an outer product (`k == 1`)
//!
//! Default is a simple triple loop; the `matrixmultiply` feature swaps in `dgemm`.

/// `C = alpha * A B + beta * C` over strided row-major views.
///
/// `A` is `(m, k)`, `B` is `(k, n)`, `C` is `(m, n)`.
#[allow(clippy::too_many_arguments)]
#[inline]
pub(crate) fn gemm_f64(
    m: usize,
    n: usize,
    k: usize,
    alpha: f64,
    a: &[f64],
    rsa: usize,
    csa: usize,
    b: &[f64],
    rsb: usize,
    csb: usize,
    beta: f64,
    c: &mut [f64],
    rsc: usize,
    csc: usize,
) {
    debug_assert!(m > 0 && n > 0 && k > 0);
    debug_assert!(rsa > 0 || m <= 1);
    debug_assert!(csa > 0 || k <= 1);
    debug_assert!(rsb > 0 || k <= 1);
    debug_assert!(csb > 0 || n <= 1);
    debug_assert!(rsc > 0 || m <= 1);
    debug_assert!(csc > 0 || n <= 1);
    debug_assert!(a.len() > (m - 1) * rsa + (k - 1) * csa);
    debug_assert!(b.len() > (k - 1) * rsb + (n - 1) * csb);
    debug_assert!(c.len() > (m - 1) * rsc + (n - 1) * csc);

    #[cfg(feature = "matrixmultiply")]
    {
        // matrixmultiply supports arbitrary strides.
        unsafe {
            matrixmultiply::dgemm(
                m,
                k,
                n,
                alpha,
                a.as_ptr(),
                rsa as isize,
                csa as isize,
                b.as_ptr(),
                rsb as isize,
                csb as isize,
                beta,
                c.as_mut_ptr(),
                rsc as isize,
                csc as isize,
            );
        }
    }

    #[cfg(not(feature = "matrixmultiply"))]
    for i in 0..m {
        for j in 0..n {
            let mut acc = 0.0_f64;
            let a0 = i * rsa;
            let b0 = j * csb;

            for p in 0..k {
                let av = a[a0 + p * csa];
                let bv = b[p * rsb + b0];
                acc = av.mul_add(bv, acc);
            }

            // beta == 0 overwrites, so C may hold garbage (BLAS convention).
            let idx = i * rsc + j * csc;
            c[idx] = if beta == 0.0 {
                alpha * acc
            } else {
                alpha * acc + beta * c[idx]
            };
        }
    }
}

/// `y = W x` for row-major `W` of shape `(rows, cols)`.
pub(crate) fn matvec(w: &[f64], rows: usize, cols: usize, x: &[f64], y: &mut [f64]) {
    assert_eq!(w.len(), rows * cols, "matrix len {} != {rows} * {cols}", w.len());
    assert_eq!(x.len(), cols, "vector len {} != cols {cols}", x.len());
    assert_eq!(y.len(), rows, "output len {} != rows {rows}", y.len());
    gemm_f64(rows, 1, cols, 1.0, w, cols, 1, x, 1, 1, 0.0, y, 1, 1);
}

/// `dx += W^T dy`.
pub(crate) fn matvec_transposed_acc(
    w: &[f64],
    rows: usize,
    cols: usize,
    dy: &[f64],
    dx: &mut [f64],
) {
    assert_eq!(w.len(), rows * cols, "matrix len {} != {rows} * {cols}", w.len());
    assert_eq!(dy.len(), rows, "upstream len {} != rows {rows}", dy.len());
    assert_eq!(dx.len(), cols, "gradient len {} != cols {cols}", dx.len());
    gemm_f64(cols, 1, rows, 1.0, w, 1, cols, dy, 1, 1, 1.0, dx, 1, 1);
}

/// `dW += dy x^T`.
pub(crate) fn outer_acc(dy: &[f64], x: &[f64], dw: &mut [f64]) {
    let (rows, cols) = (dy.len(), x.len());
    assert_eq!(dw.len(), rows * cols, "gradient len {} != {rows} * {cols}", dw.len());
    gemm_f64(rows, cols, 1, 1.0, dy, 1, 1, x, cols, 1, 1.0, dw, cols, 1);
}
