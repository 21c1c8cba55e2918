//! Arithmetic over GF(2^8)
//!
//! Bytes are treated as elements of the finite field with reduction polynomial
//! `x^8 + x^4 + x^3 + x + 1` (`0x11B`). Multiplication and division go through
//! log/antilog tables built once by walking powers of the generator `3`; the
//! tables are immutable afterwards and safe to share between threads.

use std::sync::LazyLock;

use crate::error::{Error, Result};

/// Reduction polynomial for the field
const POLYNOMIAL: u16 = 0x11B;

/// Order of the multiplicative group
const GROUP_ORDER: usize = 255;

struct Tables {
    exp: [u8; GROUP_ORDER],
    log: [u8; 256],
}

static TABLES: LazyLock<Tables> = LazyLock::new(|| {
    let mut exp = [0u8; GROUP_ORDER];
    let mut log = [0u8; 256];
    let mut x: u16 = 1;

    for (i, slot) in exp.iter_mut().enumerate() {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "x is reduced below 0x100 on every step"
        )]
        let element = x as u8;
        #[allow(
            clippy::cast_possible_truncation,
            reason = "i < 255 always fits in u8"
        )]
        let power = i as u8;
        *slot = element;
        log[element as usize] = power;

        // x * 3 = (x * 2) ^ x
        let mut doubled = x << 1;
        if doubled & 0x100 != 0 {
            doubled ^= POLYNOMIAL;
        }
        x = doubled ^ x;
    }

    Tables { exp, log }
});

/// Field addition
#[inline]
#[must_use]
pub fn add(a: u8, b: u8) -> u8 {
    a ^ b
}

/// Field subtraction (identical to addition in characteristic 2)
#[inline]
#[must_use]
pub fn sub(a: u8, b: u8) -> u8 {
    a ^ b
}

/// Field multiplication
#[must_use]
pub fn mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let tables = &*TABLES;
    let exponent = (tables.log[a as usize] as usize + tables.log[b as usize] as usize) % GROUP_ORDER;
    tables.exp[exponent]
}

/// Field division
///
/// # Errors
/// Returns [`Error::DivisionByZero`] if `b` is zero
pub fn div(a: u8, b: u8) -> Result<u8> {
    if b == 0 {
        return Err(Error::DivisionByZero);
    }
    if a == 0 {
        return Ok(0);
    }
    let tables = &*TABLES;
    let exponent = (tables.log[a as usize] as usize + GROUP_ORDER
        - tables.log[b as usize] as usize)
        % GROUP_ORDER;
    Ok(tables.exp[exponent])
}

/// Evaluates a polynomial at `x` using Horner's method
///
/// `coefficients[0]` is the constant term.
#[must_use]
pub fn eval_polynomial(coefficients: &[u8], x: u8) -> u8 {
    coefficients
        .iter()
        .rev()
        .fold(0, |acc, &coefficient| add(mul(acc, x), coefficient))
}

/// Interpolates the value at x=0 of the polynomial through `points`
///
/// Each point is `(x_i, y_i)`; the `x_i` must be distinct and non-zero.
///
/// # Errors
/// Returns [`Error::DivisionByZero`] if two points share an x-coordinate
pub fn interpolate_at_zero(points: &[(u8, u8)]) -> Result<u8> {
    let mut result = 0;
    for (i, &(xi, yi)) in points.iter().enumerate() {
        let mut numerator = 1;
        let mut denominator = 1;
        for (j, &(xj, _)) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            numerator = mul(numerator, xj);
            denominator = mul(denominator, sub(xi, xj));
        }
        result = add(result, mul(yi, div(numerator, denominator)?));
    }
    Ok(result)
}
