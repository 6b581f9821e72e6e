pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use approx::{abs_diff_eq, assert_abs_diff_eq};
pub use bbox::prelude::*;
pub use bbox::{Xywh, Xyxy};
pub use getset::{CopyGetters, Getters};
pub use itertools::{izip, Itertools as _};
pub use lazy_static::lazy_static;
pub use log::{info, warn};
pub use noisy_float::prelude::*;
pub use serde::{Deserialize, Serialize};
pub use std::{
    borrow::Borrow,
    collections::HashSet,
    iter,
    path::Path,
    sync::Once,
    time::{Duration, Instant},
};
pub use strum::Display;
pub use tch::{
    nn::{self, ModuleT as _},
    Device, IndexOp, Kind, Reduction, Tensor,
};
pub use tch_act::{Activation, TensorActivationExt as _};
pub use tch_tensor_like::TensorLike;

unzip_n::unzip_n!(pub 3);
