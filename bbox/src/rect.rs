use super::{Xywh, Xyxy};
use crate::common::*;

/// The generic rectangle.
pub trait Rect {
    type Type;

    fn x_min(&self) -> Self::Type;
    fn y_min(&self) -> Self::Type;
    fn x_max(&self) -> Self::Type;
    fn y_max(&self) -> Self::Type;
    fn cx(&self) -> Self::Type;
    fn cy(&self) -> Self::Type;
    fn w(&self) -> Self::Type;
    fn h(&self) -> Self::Type;

    fn try_from_xyxy(xyxy: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;

    fn try_from_xywh(xywh: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;
}

pub trait RectNum: Rect
where
    Self::Type: Num + PartialOrd,
{
    fn from_xyxy(xyxy: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_xyxy(xyxy).unwrap()
    }

    fn from_xywh(xywh: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_xywh(xywh).unwrap()
    }

    fn xywh(&self) -> [Self::Type; 4] {
        [self.cx(), self.cy(), self.w(), self.h()]
    }

    fn xyxy(&self) -> [Self::Type; 4] {
        [self.x_min(), self.y_min(), self.x_max(), self.y_max()]
    }

    fn to_xywh(&self) -> Xywh<Self::Type> {
        Xywh {
            cx: self.cx(),
            cy: self.cy(),
            w: self.w(),
            h: self.h(),
        }
    }

    fn to_xyxy(&self) -> Xyxy<Self::Type> {
        Xyxy {
            x_min: self.x_min(),
            y_min: self.y_min(),
            x_max: self.x_max(),
            y_max: self.y_max(),
        }
    }

    fn area(&self) -> <Self::Type as Mul<Self::Type>>::Output
    where
        Self::Type: Mul<Self::Type>,
    {
        self.w() * self.h()
    }
}

pub trait RectFloat: RectNum
where
    Self::Type: Float,
{
    /// Compute the smallest box enclosing both boxes.
    fn closure_with<R>(&self, other: &R) -> Xyxy<Self::Type>
    where
        R: Rect<Type = Self::Type>,
    {
        let x_min = self.x_min().min(other.x_min());
        let y_min = self.y_min().min(other.y_min());
        let x_max = self.x_max().max(other.x_max());
        let y_max = self.y_max().max(other.y_max());
        Xyxy::from_xyxy([x_min, y_min, x_max, y_max])
    }

    fn intersect_with<R>(&self, other: &R) -> Option<Xyxy<Self::Type>>
    where
        R: Rect<Type = Self::Type>,
    {
        let x_min = self.x_min().max(other.x_min());
        let y_min = self.y_min().max(other.y_min());
        let x_max = self.x_max().min(other.x_max());
        let y_max = self.y_max().min(other.y_max());
        (x_max > x_min && y_max > y_min).then(|| Xyxy::from_xyxy([x_min, y_min, x_max, y_max]))
    }

    fn intersection_area_with<R>(&self, other: &R) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        self.intersect_with(other)
            .map(|rect| rect.area())
            .unwrap_or_else(Self::Type::zero)
    }

    fn iou_with<R>(&self, other: &R, epsilon: Self::Type) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        let inter_area = self.intersection_area_with(other);
        let union_area = self.area() + other.area() - inter_area;
        inter_area / (union_area + epsilon)
    }

    /// Compute the generalized IoU, ranging in `[-1, 1]`.
    fn giou_with<R>(&self, other: &R, epsilon: Self::Type) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        let inter_area = self.intersection_area_with(other);
        let union_area = self.area() + other.area() - inter_area;
        let closure_area = self.closure_with(other).area();
        let iou = inter_area / (union_area + epsilon);
        iou - (closure_area - union_area) / (closure_area + epsilon)
    }
}

impl<T> RectNum for T
where
    T: Rect,
    T::Type: Num + PartialOrd,
{
}

impl<T> RectFloat for T
where
    T: Rect,
    T::Type: Float,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn disjoint_boxes() {
        let lhs = Xyxy::from_xyxy([0.0, 0.0, 1.0, 1.0]);
        let rhs = Xyxy::from_xyxy([2.0, 0.0, 3.0, 1.0]);
        assert!(lhs.intersect_with(&rhs).is_none());
        assert_abs_diff_eq!(lhs.iou_with(&rhs, 0.0), 0.0);
        // closure is 3x1, union is 2
        assert_abs_diff_eq!(lhs.giou_with(&rhs, 0.0), -1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn half_overlap() {
        let lhs = Xywh::from_xywh([1.0, 1.0, 2.0, 2.0]);
        let rhs = Xywh::from_xywh([2.0, 1.0, 2.0, 2.0]);
        assert_abs_diff_eq!(lhs.iou_with(&rhs, 0.0), 2.0 / 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(lhs.giou_with(&rhs, 0.0), 2.0 / 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            lhs.giou_with(&rhs, 1e-16),
            rhs.giou_with(&lhs, 1e-16),
            epsilon = 1e-15
        );
    }

    #[test]
    fn degenerate_boxes_with_epsilon() {
        let point = Xywh::from_xywh([5.0, 5.0, 0.0, 0.0]);
        assert_eq!(point.iou_with(&point, 1e-16), 0.0);
        assert_eq!(point.giou_with(&point, 1e-16), 0.0);
    }
}
