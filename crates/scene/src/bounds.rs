use glam::{Mat4, Vec3};

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(point1: Vec3, point2: Vec3) -> Self {
        let min = point1.min(point2);
        let max = point1.max(point2);
        Self { min, max }
    }

    /// Smallest box enclosing every point, or `None` for an empty iterator.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Self::new(first, first), |mut aabb, p| {
            aabb.expand_to(p);
            aabb
        }))
    }

    pub fn expand_to(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn corners(&self) -> [Vec3; 8] {
        [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ]
    }

    /// Box enclosing this box after `matrix` is applied.
    ///
    /// Exact for scale + translation; conservative once rotation is involved.
    #[must_use]
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let corners = self.corners().map(|corner| matrix.transform_point3(corner));
        let mut aabb = Self::new(corners[0], corners[0]);
        for corner in &corners[1..] {
            aabb.expand_to(*corner);
        }
        aabb
    }
}
