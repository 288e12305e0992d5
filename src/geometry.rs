use cgmath::{Matrix3, Vector2, Vector3};

pub type Vector = Vector2<f64>;
pub type Affine = Matrix3<f64>;

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn center(&self) -> Vector {
        Vector::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(f64::from(width), f64::from(height))
    }
}

/// Apply a homogeneous 2D transform to a point
pub fn transform_point(m: &Affine, p: Vector) -> Vector {
    let v = *m * Vector3::new(p.x, p.y, 1.0);
    Vector::new(v.x, v.y)
}
