use super::{Rect, Xyxy};
use crate::common::*;

/// Bounding box in center-x, center-y, width, height format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Xywh<T> {
    pub(crate) cx: T,
    pub(crate) cy: T,
    pub(crate) w: T,
    pub(crate) h: T,
}

impl<T> Xywh<T> {
    pub fn try_cast<V>(self) -> Option<Xywh<V>>
    where
        T: ToPrimitive,
        V: NumCast,
    {
        Some(Xywh {
            cx: V::from(self.cx)?,
            cy: V::from(self.cy)?,
            w: V::from(self.w)?,
            h: V::from(self.h)?,
        })
    }

    pub fn cast<V>(self) -> Xywh<V>
    where
        T: ToPrimitive,
        V: NumCast,
    {
        self.try_cast().unwrap()
    }
}

impl<T> Xywh<T>
where
    T: Copy + Num + PartialOrd,
{
    /// Scale the box about the origin, as when mapping between pixel and grid units.
    pub fn try_scale(&self, scale: T) -> Result<Self> {
        ensure!(scale > T::zero(), "scaling factor must be positive");
        let Self { cx, cy, w, h } = *self;
        Ok(Self {
            cx: cx * scale,
            cy: cy * scale,
            w: w * scale,
            h: h * scale,
        })
    }
}

impl<T> Rect for Xywh<T>
where
    T: Copy + Num + PartialOrd,
{
    type Type = T;

    fn x_min(&self) -> T {
        let two = T::one() + T::one();
        self.cx - self.w / two
    }

    fn y_min(&self) -> T {
        let two = T::one() + T::one();
        self.cy - self.h / two
    }

    fn x_max(&self) -> T {
        let two = T::one() + T::one();
        self.cx + self.w / two
    }

    fn y_max(&self) -> T {
        let two = T::one() + T::one();
        self.cy + self.h / two
    }

    fn cx(&self) -> T {
        self.cx
    }

    fn cy(&self) -> T {
        self.cy
    }

    fn w(&self) -> T {
        self.w
    }

    fn h(&self) -> T {
        self.h
    }

    fn try_from_xyxy(xyxy: [T; 4]) -> Result<Self> {
        let [x_min, y_min, x_max, y_max] = xyxy;
        let two = T::one() + T::one();
        let w = x_max - x_min;
        let h = y_max - y_min;
        ensure!(
            w >= T::zero() && h >= T::zero(),
            "box width and height must be non-negative"
        );
        Ok(Self {
            cx: x_min + w / two,
            cy: y_min + h / two,
            w,
            h,
        })
    }

    fn try_from_xywh(xywh: [T; 4]) -> Result<Self> {
        let [cx, cy, w, h] = xywh;
        ensure!(
            w >= T::zero() && h >= T::zero(),
            "box width and height must be non-negative"
        );
        Ok(Self { cx, cy, w, h })
    }
}

impl<T> From<&Xyxy<T>> for Xywh<T>
where
    T: Copy + Num,
{
    fn from(from: &Xyxy<T>) -> Self {
        let two = T::one() + T::one();
        let Xyxy {
            x_min,
            y_min,
            x_max,
            y_max,
        } = *from;
        let w = x_max - x_min;
        let h = y_max - y_min;
        Self {
            cx: x_min + w / two,
            cy: y_min + h / two,
            w,
            h,
        }
    }
}

impl<T> From<Xyxy<T>> for Xywh<T>
where
    T: Copy + Num,
{
    fn from(from: Xyxy<T>) -> Self {
        (&from).into()
    }
}

impl<T> AsRef<Xywh<T>> for Xywh<T> {
    fn as_ref(&self) -> &Xywh<T> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    #[test]
    fn corner_conversion() {
        let bbox = Xywh::from_xywh([10.0, 20.0, 4.0, 8.0]);
        assert_eq!(bbox.xyxy(), [8.0, 16.0, 12.0, 24.0]);
        assert_eq!(Xywh::from(bbox.to_xyxy()), bbox);
    }

    #[test]
    fn negative_size_is_rejected() {
        assert!(Xywh::try_from_xywh([0.0, 0.0, -1.0, 1.0]).is_err());
        assert!(Xywh::try_from_xyxy([2.0, 0.0, 1.0, 1.0]).is_err());
        assert!(Xywh::from_xywh([1.0, 1.0, 1.0, 1.0]).try_scale(0.0).is_err());
    }
}
