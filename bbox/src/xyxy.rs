use super::{Rect, Xywh};
use crate::common::*;

/// Bounding box in corner format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Xyxy<T> {
    pub(crate) x_min: T,
    pub(crate) y_min: T,
    pub(crate) x_max: T,
    pub(crate) y_max: T,
}

impl<T> Rect for Xyxy<T>
where
    T: Copy + Num + PartialOrd,
{
    type Type = T;

    fn x_min(&self) -> T {
        self.x_min
    }

    fn y_min(&self) -> T {
        self.y_min
    }

    fn x_max(&self) -> T {
        self.x_max
    }

    fn y_max(&self) -> T {
        self.y_max
    }

    fn cx(&self) -> T {
        let two = T::one() + T::one();
        self.x_min + self.w() / two
    }

    fn cy(&self) -> T {
        let two = T::one() + T::one();
        self.y_min + self.h() / two
    }

    fn w(&self) -> T {
        self.x_max - self.x_min
    }

    fn h(&self) -> T {
        self.y_max - self.y_min
    }

    fn try_from_xyxy(xyxy: [T; 4]) -> Result<Self> {
        let [x_min, y_min, x_max, y_max] = xyxy;
        ensure!(
            x_max >= x_min && y_max >= y_min,
            "box width and height must be non-negative"
        );
        Ok(Self {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    fn try_from_xywh(xywh: [T; 4]) -> Result<Self> {
        let [cx, cy, w, h] = xywh;
        ensure!(
            w >= T::zero() && h >= T::zero(),
            "box width and height must be non-negative"
        );
        let two = T::one() + T::one();
        Ok(Self {
            x_min: cx - w / two,
            y_min: cy - h / two,
            x_max: cx + w / two,
            y_max: cy + h / two,
        })
    }
}

impl<T> From<&Xywh<T>> for Xyxy<T>
where
    T: Copy + Num + PartialOrd,
{
    fn from(from: &Xywh<T>) -> Self {
        Self {
            x_min: from.x_min(),
            y_min: from.y_min(),
            x_max: from.x_max(),
            y_max: from.y_max(),
        }
    }
}

impl<T> From<Xywh<T>> for Xyxy<T>
where
    T: Copy + Num + PartialOrd,
{
    fn from(from: Xywh<T>) -> Self {
        (&from).into()
    }
}
