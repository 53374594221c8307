//! Kaiser analysis window, parameterized by sidelobe attenuation.
//!
//! The analyzer needs three windows over the same support: the window
//! itself, the time-ramped window, and the exact time derivative of the
//! window. All lengths are odd so the window has a true center sample.

use std::f64::consts::PI;

/// Zeroth-order modified Bessel function of the first kind (power series).
pub fn bessel_i0(x: f64) -> f64 {
    let half = x / 2.0;
    let mut term = 1.0;
    let mut sum = 1.0;
    let mut k = 1.0;
    loop {
        term *= (half / k) * (half / k);
        sum += term;
        if term < sum * 1e-18 {
            return sum;
        }
        k += 1.0;
    }
}

/// First-order modified Bessel function of the first kind.
pub fn bessel_i1(x: f64) -> f64 {
    let half = x / 2.0;
    let mut term = half;
    let mut sum = half;
    let mut k = 1.0;
    loop {
        term *= (half * half) / (k * (k + 1.0));
        sum += term;
        if term < sum.abs() * 1e-18 {
            return sum;
        }
        k += 1.0;
    }
}

/// Kaiser shape parameter for the requested sidelobe attenuation in
/// positive dB (Kaiser's piecewise empirical formula).
pub fn kaiser_shape(sidelobe_db: f64) -> f64 {
    let a = sidelobe_db;
    if a > 50.0 {
        0.1102 * (a - 8.7)
    } else if a >= 21.0 {
        0.5842 * (a - 21.0).powf(0.4) + 0.07886 * (a - 21.0)
    } else {
        0.0
    }
}

/// Window length (odd) whose zero-to-zero main lobe spans
/// `main_lobe_width_norm` cycles per sample for shape `beta`.
pub fn kaiser_length(main_lobe_width_norm: f64, beta: f64) -> usize {
    assert!(main_lobe_width_norm > 0.0);
    let n = 1.0 + 2.0 * (PI * PI + beta * beta).sqrt() / (PI * main_lobe_width_norm);
    let n = n.ceil() as usize;
    if n % 2 == 0 { n + 1 } else { n.max(3) }
}

/// Symmetric Kaiser window of odd length `n`.
pub fn kaiser_window(n: usize, beta: f64) -> Vec<f64> {
    debug_assert!(n % 2 == 1);
    if n <= 1 {
        return vec![1.0];
    }
    let c = (n - 1) as f64 / 2.0;
    let norm = bessel_i0(beta);
    (0..n)
        .map(|i| {
            let x = (i as f64 - c) / c;
            bessel_i0(beta * (1.0 - x * x).max(0.0).sqrt()) / norm
        })
        .collect()
}

/// Exact time derivative of the Kaiser window, in per-sample units
/// (dw/di at each sample index i).
pub fn kaiser_window_derivative(n: usize, beta: f64) -> Vec<f64> {
    debug_assert!(n % 2 == 1);
    if n <= 1 {
        return vec![0.0];
    }
    let c = (n - 1) as f64 / 2.0;
    let norm = bessel_i0(beta);
    (0..n)
        .map(|i| {
            let x = (i as f64 - c) / c;
            let u = (1.0 - x * x).max(0.0);
            // d/dx I0(beta*sqrt(1-x^2)) = -beta*x/sqrt(1-x^2) * I1(...)
            // with the I1(z)/z -> 1/2 limit at the window edges.
            let dw_dx = if u < 1e-12 {
                -beta * beta * x / (2.0 * norm)
            } else {
                let s = u.sqrt();
                -beta * x * bessel_i1(beta * s) / (s * norm)
            };
            dw_dx / c
        })
        .collect()
}

/// Time ramp centered on the window: i - (n-1)/2, in samples.
pub fn time_ramp(n: usize) -> Vec<f64> {
    let c = (n - 1) as f64 / 2.0;
    (0..n).map(|i| i as f64 - c).collect()
}
