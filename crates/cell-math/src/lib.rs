//! Overflow-safe quantity and capacity arithmetic.
//!
//! Every quantity in the hypercell engine lives in `u64` and legitimately
//! approaches the top of that range: a byte multiplier around 2³¹ times a
//! conversion rate times a quantity overflows 64 bits in a single multiply.
//! All capacity and insertion math routes through this crate so that
//! out-of-range results saturate at `u64::MAX` instead of wrapping.
//!
//! The one non-exact helper, [`estimate_used_bytes`], is a float-assisted
//! ratio for cosmetic displays once the exact capacity figure has saturated.
//! It is never consulted for authoritative insert/extract decisions.

/// Saturating addition.
pub fn sat_add(a: u64, b: u64) -> u64 {
    a.saturating_add(b)
}

/// Saturating multiplication.
pub fn sat_mul(a: u64, b: u64) -> u64 {
    a.saturating_mul(b)
}

/// Saturating subtraction, flooring at zero.
pub fn sat_sub(a: u64, b: u64) -> u64 {
    a.saturating_sub(b)
}

/// Underflow-guarded subtraction for remainders: if `b` exceeds `a`, the
/// larger input is returned instead of wrapping.
pub fn sat_sub_or_keep(a: u64, b: u64) -> u64 {
    if b > a {
        b
    } else {
        a - b
    }
}

/// Ceiling division. `b == 0` yields 0.
pub fn ceil_div(a: u64, b: u64) -> u64 {
    if b == 0 {
        return 0;
    }
    a / b + u64::from(a % b != 0)
}

/// Computes `⌊a·b·c / n⌋` exactly, without an intermediate overflow.
///
/// Each factor is first reduced against `n` by its greatest common divisor,
/// so the division happens before the final multiply wherever exactness
/// allows. If the exact result still exceeds `u64`, the result saturates at
/// `u64::MAX`. `n == 0` yields 0.
pub fn mul_div(a: u64, b: u64, c: u64, n: u64) -> u64 {
    if n == 0 {
        return 0;
    }
    let mut divisor = u128::from(n);
    let mut factors = [u128::from(a), u128::from(b), u128::from(c)];
    for f in factors.iter_mut() {
        let g = gcd(*f, divisor);
        if g > 1 {
            *f /= g;
            divisor /= g;
        }
    }

    let product = factors[0]
        .checked_mul(factors[1])
        .and_then(|p| p.checked_mul(factors[2]));
    match product {
        Some(p) => clamp_u64(p / divisor),
        // Exact result is beyond even a u128 product of reduced factors,
        // so it is certainly beyond u64.
        None => u64::MAX,
    }
}

/// Float-assisted used-bytes estimate for displays once exact capacity has
/// saturated. Clamped to `total_bytes`; non-authoritative by contract.
pub fn estimate_used_bytes(stored: u64, max_stored: u64, total_bytes: u64) -> u64 {
    if max_stored == 0 {
        return 0;
    }
    let ratio = stored as f64 / max_stored as f64;
    let estimate = (ratio * total_bytes as f64).ceil();
    if estimate >= total_bytes as f64 {
        total_bytes
    } else {
        estimate as u64
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a.max(1)
}

fn clamp_u64(v: u128) -> u64 {
    if v > u128::from(u64::MAX) {
        u64::MAX
    } else {
        v as u64
    }
}
