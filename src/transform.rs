//! The pan / zoom / rotation / flip state of a displayed image.
//!
//! `ImageTransform::matrix` composes the components in the order zoom, rotation,
//! flip, pan. Zooming, rotating and flipping keep the point of the image under
//! the center of the viewport fixed by correcting the pan afterwards.
//!
//! There is a single flip axis. A vertical flip is a horizontal flip followed
//! by a half turn, and a rotation applied while flipped is mirrored so that it
//! stays clockwise on screen.

use std::fmt;
use std::str::FromStr;

use cgmath::{Matrix3, SquareMatrix};
use serde::Deserialize;

use crate::error::{EngineError, Result};
use crate::geometry::{transform_point, Affine, Size, Vector};

/// A transform on a raw image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageTransform {
    /// Offset of the top-left corner of the image from the origin
    pan: Vector,
    /// Zoom scale factor (> 0)
    zoom: f64,
    /// Angle of clockwise rotation (in [0, 360))
    rotation: f64,
    flipped: bool,
}

impl Default for ImageTransform {
    fn default() -> Self {
        Self {
            pan: Vector::new(0.0, 0.0),
            zoom: 1.0,
            rotation: 0.0,
            flipped: false,
        }
    }
}

/// Initial scaling based on the sizes of the image and the viewport
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scaling {
    /// Zoom stays at 1
    #[default]
    None,
    FitWidth,
    FitHeight,
    /// Fit the whole image inside the viewport (leaves bars)
    Fit,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignX {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignY {
    #[default]
    Top,
    Center,
    Bottom,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Align {
    pub x: AlignX,
    pub y: AlignY,
}

impl FromStr for Scaling {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "fit_width" => Ok(Self::FitWidth),
            "fit_height" => Ok(Self::FitHeight),
            "fit" => Ok(Self::Fit),
            _ => Err(EngineError::invalid("scaling", s)),
        }
    }
}

impl FromStr for AlignX {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "left" => Ok(Self::Left),
            "center" => Ok(Self::Center),
            "right" => Ok(Self::Right),
            _ => Err(EngineError::invalid("X align", s)),
        }
    }
}

impl FromStr for AlignY {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "top" => Ok(Self::Top),
            "center" => Ok(Self::Center),
            "bottom" => Ok(Self::Bottom),
            _ => Err(EngineError::invalid("Y align", s)),
        }
    }
}

impl fmt::Display for Scaling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::FitWidth => "fit_width",
            Self::FitHeight => "fit_height",
            Self::Fit => "fit",
        })
    }
}

/// Bring an angle in degrees into [0, 360)
fn normalize_degrees(degrees: f64) -> f64 {
    let d = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to exactly 360
    if d >= 360.0 {
        0.0
    } else {
        d
    }
}

/// A relative zoom factor must be non-zero (negative divides)
pub fn check_zoom_factor(factor: f64) -> Result<()> {
    if factor == 0.0 || !factor.is_finite() {
        return Err(EngineError::NonPositive {
            what: "zoom factor",
            value: factor as f32,
        });
    }
    Ok(())
}

/// Angles must be finite to keep the rotation in [0, 360)
pub fn check_angle(degrees: f64) -> Result<()> {
    if !degrees.is_finite() {
        return Err(EngineError::invalid("rotation angle", &degrees.to_string()));
    }
    Ok(())
}

/// An absolute zoom must be positive
pub fn check_zoom(zoom: f64) -> Result<()> {
    if !(zoom > 0.0 && zoom.is_finite()) {
        return Err(EngineError::NonPositive {
            what: "zoom",
            value: zoom as f32,
        });
    }
    Ok(())
}

impl ImageTransform {
    /// The transform an image starts with for the given scaling and align options
    pub fn initial(scaling: Scaling, align: Align, image: Size, view: Size) -> Self {
        let factor = |v: f64, i: f64| {
            let f = v / i;
            if f.is_finite() && f > 0.0 {
                f
            } else {
                1.0
            }
        };
        let width_factor = factor(view.width, image.width);
        let height_factor = factor(view.height, image.height);

        let zoom = match scaling {
            Scaling::None => 1.0,
            Scaling::FitWidth => width_factor,
            Scaling::FitHeight => height_factor,
            Scaling::Fit => width_factor.min(height_factor),
        };

        // Align the scaled image
        let scaled = image.scale(zoom);
        let dx = view.width - scaled.width;
        let dy = view.height - scaled.height;

        let x = match align.x {
            AlignX::Left => 0.0,
            AlignX::Center => dx / 2.0,
            AlignX::Right => dx,
        };
        let y = match align.y {
            AlignY::Top => 0.0,
            AlignY::Center => dy / 2.0,
            AlignY::Bottom => dy,
        };

        Self {
            pan: Vector::new(x, y),
            zoom,
            rotation: 0.0,
            flipped: false,
        }
    }

    /// Recompute every component from the scaling and align options
    pub fn reset(&mut self, scaling: Scaling, align: Align, image: Size, view: Size) {
        *self = Self::initial(scaling, align, image, view);
    }

    /// The affine taking raw image space (top-left corner at the origin) to
    /// viewport space (origin at the top-left of the viewport)
    pub fn matrix(&self) -> Affine {
        let z = self.zoom;
        let zoom = Matrix3::new(z, 0.0, 0.0, 0.0, z, 0.0, 0.0, 0.0, 1.0);

        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let rotation = Matrix3::new(cos, sin, 0.0, -sin, cos, 0.0, 0.0, 0.0, 1.0);

        let flip = if self.flipped {
            Matrix3::new(-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0)
        } else {
            Matrix3::identity()
        };

        let pan = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, self.pan.x, self.pan.y, 1.0);

        pan * flip * rotation * zoom
    }

    /// Apply `update` while keeping the image point under the viewport center in place
    fn with_fixed_center(&mut self, update: impl FnOnce(&mut Self), view: Size) {
        let center = view.center();

        // Every component is invertible, so this only fails on degenerate state
        let focus = self
            .matrix()
            .invert()
            .map(|inverse| transform_point(&inverse, center));

        update(self);

        if let Some(focus) = focus {
            let moved = transform_point(&self.matrix(), focus);
            self.pan += center - moved;
        }
    }

    // === Updates ===

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.pan += Vector::new(dx, dy);
    }

    /// Multiply the zoom by `factor`; a negative factor divides by its magnitude,
    /// so `zoom(f)` followed by `zoom(-f)` restores the previous zoom.
    pub fn zoom(&mut self, factor: f64, view: Size) -> Result<()> {
        check_zoom_factor(factor)?;

        self.with_fixed_center(
            |t| {
                if factor > 0.0 {
                    t.zoom *= factor
                } else {
                    t.zoom /= -factor
                }
            },
            view,
        );
        Ok(())
    }

    pub fn rotate(&mut self, degrees: f64, view: Size) -> Result<()> {
        check_angle(degrees)?;
        let degrees = normalize_degrees(degrees);
        self.with_fixed_center(
            |t| {
                let delta = if t.flipped { -degrees } else { degrees };
                t.rotation = normalize_degrees(t.rotation + delta);
            },
            view,
        );
        Ok(())
    }

    pub fn hflip(&mut self, view: Size) {
        self.with_fixed_center(|t| t.flipped = !t.flipped, view);
    }

    pub fn vflip(&mut self, view: Size) {
        self.with_fixed_center(
            |t| {
                t.flipped = !t.flipped;
                t.rotation = normalize_degrees(t.rotation + 180.0);
            },
            view,
        );
    }

    // === Setters ===

    pub fn set_pan(&mut self, x: f64, y: f64) {
        self.pan = Vector::new(x, y);
    }

    pub fn set_zoom(&mut self, factor: f64) -> Result<()> {
        check_zoom(factor)?;
        self.zoom = factor;
        Ok(())
    }

    pub fn set_rotation(&mut self, degrees: f64) -> Result<()> {
        check_angle(degrees)?;
        self.rotation = normalize_degrees(degrees);
        Ok(())
    }

    pub fn set_flipped(&mut self, flipped: bool) {
        self.flipped = flipped;
    }

    // === Getters ===

    pub fn pan_offset(&self) -> (f64, f64) {
        (self.pan.x, self.pan.y)
    }

    pub fn zoom_factor(&self) -> f64 {
        self.zoom
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn flipped(&self) -> bool {
        self.flipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEW: Size = Size::new(800.0, 600.0);
    const EPS: f64 = 1e-9;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS * a.abs().max(1.0)
    }

    #[test]
    fn test_zoom_inverse_restores_state() {
        for start in [1.0, 0.37, 12.5] {
            for f in [2.0, 0.5, 3.3, 1e-3, 1e3] {
                let mut t = ImageTransform::default();
                t.set_zoom(start).unwrap();
                t.zoom(f, VIEW).unwrap();
                t.zoom(-f, VIEW).unwrap();
                assert!(close(t.zoom_factor(), start), "start {} f {}", start, f);
            }
        }
    }

    #[test]
    fn test_negative_zoom_divides() {
        let mut t = ImageTransform::default();
        t.zoom(-2.0, VIEW).unwrap();
        assert!(close(t.zoom_factor(), 0.5));
    }

    #[test]
    fn test_zero_zoom_rejected_without_change() {
        let mut t = ImageTransform::default();
        t.pan(3.0, 4.0);
        let before = t;
        assert!(t.zoom(0.0, VIEW).unwrap_err().is_range());
        assert_eq!(t, before);
    }

    #[test]
    fn test_set_zoom_requires_positive() {
        let mut t = ImageTransform::default();
        assert!(t.set_zoom(0.0).is_err());
        assert!(t.set_zoom(-1.0).is_err());
        assert!(t.set_zoom(f64::NAN).is_err());
        assert_eq!(t.zoom_factor(), 1.0);
        t.set_zoom(2.5).unwrap();
        assert_eq!(t.zoom_factor(), 2.5);
    }

    #[test]
    fn test_rotate_full_turn_is_noop() {
        for start in [0.0, 0.1, 45.0, 359.9] {
            let mut t = ImageTransform::default();
            t.set_rotation(start).unwrap();
            t.rotate(360.0, VIEW).unwrap();
            assert_eq!(t.rotation(), normalize_degrees(start));
            t.rotate(-720.0, VIEW).unwrap();
            assert_eq!(t.rotation(), normalize_degrees(start));
        }
    }

    #[test]
    fn test_rotation_stays_in_range() {
        let mut t = ImageTransform::default();
        t.rotate(-90.0, VIEW).unwrap();
        assert!(close(t.rotation(), 270.0));
        t.set_rotation(725.0).unwrap();
        assert!(close(t.rotation(), 5.0));
        t.set_rotation(-1e-20).unwrap();
        assert!(t.rotation() >= 0.0 && t.rotation() < 360.0);
    }

    #[test]
    fn test_non_finite_angles_rejected() {
        let mut t = ImageTransform::default();
        t.set_rotation(90.0).unwrap();
        let before = t;
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                t.rotate(bad, VIEW),
                Err(EngineError::InvalidValue { .. })
            ));
            assert!(t.set_rotation(bad).is_err());
        }
        assert_eq!(t, before);
    }

    #[test]
    fn test_hflip_then_vflip_restores_flip() {
        for flipped in [false, true] {
            let mut t = ImageTransform::default();
            t.set_flipped(flipped);
            t.hflip(VIEW);
            assert_ne!(t.flipped(), flipped);
            t.vflip(VIEW);
            assert_eq!(t.flipped(), flipped);
        }
    }

    #[test]
    fn test_rotation_mirrored_while_flipped() {
        let mut t = ImageTransform::default();
        t.hflip(VIEW);
        t.rotate(90.0, VIEW).unwrap();
        assert!(close(t.rotation(), 270.0));
    }

    #[test]
    fn test_pan_is_additive_and_set_pan_absolute() {
        let mut t = ImageTransform::default();
        t.pan(10.0, -5.0);
        t.pan(1.5, 2.5);
        assert_eq!(t.pan_offset(), (11.5, -2.5));
        t.set_pan(-3.0, 7.0);
        assert_eq!(t.pan_offset(), (-3.0, 7.0));
    }

    #[test]
    fn test_zoom_keeps_view_center_fixed() {
        let mut t = ImageTransform::default();
        t.pan(30.0, -20.0);
        let center = VIEW.center();
        let focus = transform_point(&t.matrix().invert().unwrap(), center);

        t.zoom(2.0, VIEW).unwrap();
        t.rotate(33.0, VIEW).unwrap();
        t.hflip(VIEW);

        let after = transform_point(&t.matrix(), focus);
        assert!(close(after.x, center.x));
        assert!(close(after.y, center.y));
    }

    #[test]
    fn test_initial_fit_and_align() {
        let image = Size::new(1600.0, 600.0);
        let align = Align {
            x: AlignX::Center,
            y: AlignY::Center,
        };

        let t = ImageTransform::initial(Scaling::Fit, align, image, VIEW);
        assert!(close(t.zoom_factor(), 0.5));
        // Scaled image is 800x300, centered vertically
        assert_eq!(t.pan_offset(), (0.0, 150.0));

        let t = ImageTransform::initial(Scaling::FitHeight, Align::default(), image, VIEW);
        assert!(close(t.zoom_factor(), 1.0));
        assert_eq!(t.pan_offset(), (0.0, 0.0));

        let align = Align {
            x: AlignX::Right,
            y: AlignY::Bottom,
        };
        let t = ImageTransform::initial(Scaling::None, align, Size::new(100.0, 100.0), VIEW);
        assert_eq!(t.pan_offset(), (700.0, 500.0));
    }

    #[test]
    fn test_initial_with_empty_image_keeps_positive_zoom() {
        let t = ImageTransform::initial(Scaling::Fit, Align::default(), Size::default(), VIEW);
        assert!(t.zoom_factor() > 0.0);
    }

    #[test]
    fn test_parse_options() {
        assert_eq!("fit".parse::<Scaling>().unwrap(), Scaling::Fit);
        assert_eq!("fit_width".parse::<Scaling>().unwrap(), Scaling::FitWidth);
        assert_eq!("right".parse::<AlignX>().unwrap(), AlignX::Right);
        assert_eq!("bottom".parse::<AlignY>().unwrap(), AlignY::Bottom);
        assert!("middle".parse::<AlignY>().is_err());
        assert!("stretch".parse::<Scaling>().is_err());
    }
}
