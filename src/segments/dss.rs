use crate::types::{Pt2i, Rational};

/// Digital straight segment in integer normal form.
///
/// The carrying naive line is `a*x + b*y = mu` with `(a, b)` the
/// gcd-reduced normal vector; `nu` is the enclosing strip thickness in
/// support-value units (Euclidean width times the norm of `(a, b)`);
/// the segment spans along-line positions `s` (where `s = -b*x + a*y`)
/// from `s0` to `s1`. Serialised as six little-endian `i32` in field
/// order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DigitalStraightSegment {
    a: i32,
    b: i32,
    mu: i32,
    nu: i32,
    s0: i32,
    s1: i32,
}

impl DigitalStraightSegment {
    pub fn new(a: i32, b: i32, mu: i32, nu: i32, s0: i32, s1: i32) -> Self {
        debug_assert!(a > 0 || (a == 0 && b > 0));
        debug_assert!(nu >= 0);
        debug_assert!(s0 <= s1);
        Self { a, b, mu, nu, s0, s1 }
    }

    /// Builds the segment summarising a pixel set with a known
    /// direction vector `(dx, dy)` (need not be reduced) and the
    /// Euclidean thickness `width` of its enclosing strip.
    pub fn from_pixels(pixels: &[Pt2i], dx: i32, dy: i32, width: f64) -> Option<Self> {
        if pixels.len() < 2 || (dx == 0 && dy == 0) {
            return None;
        }
        let g = gcd(dx.abs(), dy.abs()).max(1);
        let (dx, dy) = (dx / g, dy / g);
        // Normal of the direction, canonical sign.
        let (mut a, mut b) = (-dy, dx);
        if a < 0 || (a == 0 && b < 0) {
            a = -a;
            b = -b;
        }
        let mut vmin = i32::MAX;
        let mut vmax = i32::MIN;
        let mut smin = i32::MAX;
        let mut smax = i32::MIN;
        for p in pixels {
            let v = a * p.x + b * p.y;
            let s = -b * p.x + a * p.y;
            vmin = vmin.min(v);
            vmax = vmax.max(v);
            smin = smin.min(s);
            smax = smax.max(s);
        }
        let norm = ((a as f64) * (a as f64) + (b as f64) * (b as f64)).sqrt();
        let nu = (width.max(0.0) * norm).round() as i32;
        Some(Self::new(a, b, (vmin + vmax) / 2, nu, smin, smax))
    }

    #[inline]
    pub fn a(&self) -> i32 {
        self.a
    }

    #[inline]
    pub fn b(&self) -> i32 {
        self.b
    }

    #[inline]
    pub fn mu(&self) -> i32 {
        self.mu
    }

    /// Strip thickness in support-value units.
    #[inline]
    pub fn nu(&self) -> i32 {
        self.nu
    }

    #[inline]
    pub fn s0(&self) -> i32 {
        self.s0
    }

    #[inline]
    pub fn s1(&self) -> i32 {
        self.s1
    }

    /// Euclidean thickness of the enclosing strip, in pixels.
    pub fn width(&self) -> f64 {
        let norm = ((self.a as f64) * (self.a as f64) + (self.b as f64) * (self.b as f64)).sqrt();
        if norm > 0.0 {
            self.nu as f64 / norm
        } else {
            0.0
        }
    }

    /// Squared Euclidean length of the naive-line span, floored to an
    /// integer.
    pub fn length2(&self) -> i64 {
        let span = (self.s1 - self.s0) as i64;
        let den = self.a as i64 * self.a as i64 + self.b as i64 * self.b as i64;
        span * span / den
    }

    /// Exact endpoints of the carrying naive line at the segment span
    /// bounds, as `(x1, y1, x2, y2)`.
    pub fn naive_line(&self) -> (Rational, Rational, Rational, Rational) {
        let den = self.a as i64 * self.a as i64 + self.b as i64 * self.b as i64;
        let (a, b, mu) = (self.a as i64, self.b as i64, self.mu as i64);
        let at = |s: i64| {
            (
                Rational::new(a * mu - b * s, den),
                Rational::new(b * mu + a * s, den),
            )
        };
        let (x1, y1) = at(self.s0 as i64);
        let (x2, y2) = at(self.s1 as i64);
        (x1, y1, x2, y2)
    }
}

fn gcd(mut a: i32, mut b: i32) -> i32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_segment_roundtrip() {
        // Pixels along y = 3, x in [2, 10].
        let pixels: Vec<Pt2i> = (2..=10).map(|x| Pt2i::new(x, 3)).collect();
        let dss = DigitalStraightSegment::from_pixels(&pixels, 1, 0, 1.0).unwrap();
        assert_eq!(dss.length2(), 64);
        assert_eq!(dss.nu(), 1);
        let (x1, y1, x2, y2) = dss.naive_line();
        assert!((y1.to_f32() - 3.0).abs() < 1e-6);
        assert!((y2.to_f32() - 3.0).abs() < 1e-6);
        let (lo, hi) = (x1.to_f32().min(x2.to_f32()), x1.to_f32().max(x2.to_f32()));
        assert!((lo - 2.0).abs() < 1e-6 && (hi - 10.0).abs() < 1e-6);
    }

    #[test]
    fn diagonal_segment_endpoints_are_exact() {
        let pixels: Vec<Pt2i> = (0..8).map(|i| Pt2i::new(i, i)).collect();
        let dss = DigitalStraightSegment::from_pixels(&pixels, 1, 1, 0.5).unwrap();
        let (x1, y1, x2, y2) = dss.naive_line();
        // Endpoints on the diagonal, exactly.
        assert_eq!(x1.num() * y1.den(), y1.num() * x1.den());
        assert_eq!(x2.num() * y2.den(), y2.num() * x2.den());
        assert_eq!(dss.length2(), 98);
        // Half a pixel across a unit-norm-sqrt(2) line.
        assert_eq!(dss.nu(), 1);
    }
}
