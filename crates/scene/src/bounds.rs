//! Local-space bounding volumes.

use glam::Vec3;

/// Axis-aligned box plus enclosing sphere, both centered on `origin`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bounds {
    pub origin: Vec3,
    pub sphere_radius: f32,
    pub extents: Vec3,
}

impl Bounds {
    pub fn new(origin: Vec3, extents: Vec3) -> Self {
        Self {
            origin,
            sphere_radius: extents.length(),
            extents,
        }
    }

    /// Tight bounds around `points`. Empty input gives zero-sized bounds at
    /// the origin.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut iter = points.into_iter();
        let Some(first) = iter.next() else {
            return Self::default();
        };

        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Self::new((max + min) * 0.5, (max - min) * 0.5)
    }

    /// The eight box corners, `origin + extents * (±1, ±1, ±1)`.
    pub fn corners(&self) -> [Vec3; 8] {
        const SIGNS: [Vec3; 8] = [
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(1.0, 1.0, -1.0),
            Vec3::new(1.0, -1.0, 1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(-1.0, 1.0, 1.0),
            Vec3::new(-1.0, 1.0, -1.0),
            Vec3::new(-1.0, -1.0, 1.0),
            Vec3::new(-1.0, -1.0, -1.0),
        ];

        SIGNS.map(|sign| self.origin + self.extents * sign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points_centers_box() {
        let bounds = Bounds::from_points([
            Vec3::new(-1.0, 0.0, 2.0),
            Vec3::new(3.0, 2.0, 2.0),
            Vec3::new(1.0, 1.0, 4.0),
        ]);
        assert_eq!(bounds.origin, Vec3::new(1.0, 1.0, 3.0));
        assert_eq!(bounds.extents, Vec3::new(2.0, 1.0, 1.0));
        assert!((bounds.sphere_radius - 6.0f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_from_no_points() {
        assert_eq!(Bounds::from_points(std::iter::empty()), Bounds::default());
    }

    #[test]
    fn test_corners_span_extents() {
        let corners = Bounds::new(Vec3::ZERO, Vec3::ONE).corners();
        let min = corners.iter().copied().fold(Vec3::MAX, Vec3::min);
        let max = corners.iter().copied().fold(Vec3::MIN, Vec3::max);
        assert_eq!(min, Vec3::NEG_ONE);
        assert_eq!(max, Vec3::ONE);
    }
}
