use super::*;

/// Concatenates feature maps along the channel dimension.
#[derive(Debug)]
pub struct Concat2D;

impl Concat2D {
    pub fn forward<T>(&self, tensors: &[T]) -> Result<Tensor>
    where
        T: Borrow<Tensor>,
    {
        let sizes: Vec<_> = tensors
            .iter()
            .map(|tensor| -> Result<_> {
                let (b, _c, h, w) = tensor.borrow().size4()?;
                Ok((b, h, w))
            })
            .collect::<Result<_>>()?;
        ensure!(
            sizes.iter().all_equal(),
            "cannot concatenate feature maps of different sizes {:?}",
            sizes
        );
        let output = Tensor::f_cat(tensors, 1)?;
        Ok(output)
    }
}
