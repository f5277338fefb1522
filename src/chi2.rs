/*! Chi-squared distribution tail functions.

Used to calibrate the CFAR energy detector: under the noise-only
hypothesis, the energy of a segment of `L` complex samples, normalized
by the per-component noise power, is chi-squared distributed with `2L`
degrees of freedom. The detection threshold is the value whose upper
tail probability equals the wanted false alarm probability.

All the math is done in `f64`, since this only runs at construction.

Links:
* <https://en.wikipedia.org/wiki/Chi-squared_distribution>
* <https://en.wikipedia.org/wiki/Incomplete_gamma_function>
* <https://en.wikipedia.org/wiki/Lanczos_approximation>
*/
use crate::{Error, Result};

const MAX_ITER: usize = 100_000;
const EPS: f64 = 1e-15;
const FPMIN: f64 = 1e-300;

// Lanczos, g=7, n=9.
#[allow(clippy::excessive_precision)]
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_13,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural log of the gamma function, for `x > 0`.
#[must_use]
pub fn ln_gamma(x: f64) -> f64 {
    use std::f64::consts::PI;
    if x < 0.5 {
        // Reflection.
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + 7.5;
    let a = LANCZOS
        .iter()
        .enumerate()
        .skip(1)
        .fold(LANCZOS[0], |acc, (i, c)| acc + c / (x + i as f64));
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

// P(a,x) by its series. Converges quickly for x < a+1.
fn gamma_p_series(a: f64, x: f64) -> f64 {
    let mut ap = a;
    let mut del = 1.0 / a;
    let mut sum = del;
    for _ in 0..MAX_ITER {
        ap += 1.0;
        del *= x / ap;
        sum += del;
        if del.abs() < sum.abs() * EPS {
            break;
        }
    }
    sum * (-x + a * x.ln() - ln_gamma(a)).exp()
}

// Q(a,x) by its continued fraction (modified Lentz). Converges quickly
// for x >= a+1.
fn gamma_q_cf(a: f64, x: f64) -> f64 {
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / FPMIN;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..MAX_ITER {
        let i = i as f64;
        let an = -i * (i - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = b + an / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    (-x + a * x.ln() - ln_gamma(a)).exp() * h
}

/// Regularized upper incomplete gamma function `Q(a, x)`.
#[must_use]
pub fn gamma_q(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    if x < a + 1.0 {
        1.0 - gamma_p_series(a, x)
    } else {
        gamma_q_cf(a, x)
    }
}

/// Chi-squared survival function, `P(X > x)`.
#[must_use]
pub fn sf(x: f64, dof: f64) -> f64 {
    gamma_q(dof / 2.0, x / 2.0)
}

/** Chi-squared inverse survival function.

Returns `t` such that `P(X > t) = p`, for `X` chi-squared with `dof`
degrees of freedom.

The survival function is strictly decreasing, so this brackets the
answer and bisects.
*/
pub fn isf(p: f64, dof: f64) -> Result<f64> {
    if !(p > 0.0 && p < 1.0) {
        return Err(Error::config(format!(
            "tail probability must be in (0,1), got {p}"
        )));
    }
    if !(dof > 0.0 && dof.is_finite()) {
        return Err(Error::config(format!(
            "degrees of freedom must be positive, got {dof}"
        )));
    }
    let mut lo = 0.0;
    let mut hi = dof.max(1.0);
    while sf(hi, dof) > p {
        lo = hi;
        hi *= 2.0;
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if sf(mid, dof) > p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= 1e-12 * hi {
            break;
        }
    }
    Ok(0.5 * (lo + hi))
}
