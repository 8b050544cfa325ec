use super::dss::DigitalStraightSegment;
use crate::types::Pt2i;
use nalgebra::{Matrix2, SymmetricEigen};

/// A growing blurred segment: the absorbed pixels plus online moment
/// sums for the principal direction and the enclosing strip width.
pub struct BlurredSegment {
    pixels: Vec<Pt2i>,
    sum_x: f64,
    sum_y: f64,
    sum_xx: f64,
    sum_yy: f64,
    sum_xy: f64,
}

impl BlurredSegment {
    pub fn new() -> Self {
        Self {
            pixels: Vec::with_capacity(64),
            sum_x: 0.0,
            sum_y: 0.0,
            sum_xx: 0.0,
            sum_yy: 0.0,
            sum_xy: 0.0,
        }
    }

    pub fn add(&mut self, p: Pt2i) {
        let (x, y) = (p.x as f64, p.y as f64);
        self.sum_x += x;
        self.sum_y += y;
        self.sum_xx += x * x;
        self.sum_yy += y * y;
        self.sum_xy += x * y;
        self.pixels.push(p);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    #[inline]
    pub fn pixels(&self) -> &[Pt2i] {
        &self.pixels
    }

    /// Principal direction of the pixel set (unit vector), when the
    /// covariance is non-degenerate.
    pub fn principal_direction(&self) -> Option<(f64, f64)> {
        let n = self.pixels.len() as f64;
        if self.pixels.len() < 3 {
            return None;
        }
        let cx = self.sum_x / n;
        let cy = self.sum_y / n;
        let cxx = self.sum_xx / n - cx * cx;
        let cyy = self.sum_yy / n - cy * cy;
        let cxy = self.sum_xy / n - cx * cy;
        let eig = SymmetricEigen::new(Matrix2::new(cxx, cxy, cxy, cyy));
        let (v, l) = if eig.eigenvalues[0] >= eig.eigenvalues[1] {
            (eig.eigenvectors.column(0), eig.eigenvalues[0])
        } else {
            (eig.eigenvectors.column(1), eig.eigenvalues[1])
        };
        if !l.is_finite() || l <= 0.0 {
            return None;
        }
        let norm = (v[0] * v[0] + v[1] * v[1]).sqrt();
        if norm < 1e-9 {
            return None;
        }
        Some((v[0] / norm, v[1] / norm))
    }

    /// Width of the enclosing strip across the principal direction.
    pub fn strip_width(&self) -> f64 {
        let (tx, ty) = match self.principal_direction() {
            Some(d) => d,
            None => return 0.0,
        };
        let (nx, ny) = (-ty, tx);
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for p in &self.pixels {
            let v = nx * p.x as f64 + ny * p.y as f64;
            lo = lo.min(v);
            hi = hi.max(v);
        }
        if hi >= lo {
            hi - lo
        } else {
            0.0
        }
    }

    /// Summarises the segment as a digital straight segment along its
    /// principal span, carrying the enclosing strip thickness.
    pub fn to_dss(&self) -> Option<DigitalStraightSegment> {
        let (tx, ty) = self.principal_direction()?;
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        let mut pmin = self.pixels[0];
        let mut pmax = self.pixels[0];
        for p in &self.pixels {
            let s = tx * p.x as f64 + ty * p.y as f64;
            if s < lo {
                lo = s;
                pmin = *p;
            }
            if s > hi {
                hi = s;
                pmax = *p;
            }
        }
        DigitalStraightSegment::from_pixels(
            &self.pixels,
            pmax.x - pmin.x,
            pmax.y - pmin.y,
            self.strip_width(),
        )
    }
}

impl Default for BlurredSegment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_width_follows_the_ridge() {
        let mut bs = BlurredSegment::new();
        for x in 0..20 {
            bs.add(Pt2i::new(x, 5));
        }
        assert!(bs.strip_width() < 0.5);
        // A parallel row one pixel off widens the strip to one.
        for x in 0..20 {
            bs.add(Pt2i::new(x, 6));
        }
        let w = bs.strip_width();
        assert!((w - 1.0).abs() < 0.3, "strip width {w}");
    }

    #[test]
    fn dss_spans_the_extremes() {
        let mut bs = BlurredSegment::new();
        for i in 0..30 {
            bs.add(Pt2i::new(10 + i, 20 + i / 3));
        }
        let dss = bs.to_dss().unwrap();
        let l2 = dss.length2();
        assert!(l2 >= 29 * 29, "span too short: {l2}");
    }
}
