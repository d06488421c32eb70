//! Small numerical helpers shared by the estimators.
use num_traits::{Float, FromPrimitive};

pub fn _isclose<T>(x: T, y: T, rtol: T, atol: T) -> bool
where
    T: Float,
{
    (x - y).abs() <= (atol + rtol * y.abs())
}

pub fn isclose<T>(x: T, y: T) -> bool
where
    T: Float + FromPrimitive,
{
    _isclose(x, y, T::from_f64(1e-5).unwrap(), T::from_f64(1e-8).unwrap())
}

pub fn aboutzero<T>(x: T) -> bool
where
    T: Float + FromPrimitive,
{
    isclose(x, T::zero())
}

/// The running totals needed for a weighted mean and population variance
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedMoments {
    pub weight: f64,
    pub sum: f64,
}

impl WeightedMoments {
    #[inline]
    pub fn push(&mut self, x: f64, w: f64) {
        self.weight += w;
        self.sum += w * x;
    }

    /// The weighted mean, or `None` when no weight has been accumulated
    pub fn mean(&self) -> Option<f64> {
        if self.weight > 0.0 {
            Some(self.sum / self.weight)
        } else {
            None
        }
    }
}

/// Compute the weighted mean and the weighted population variance,
/// $`\sum w(x - \bar{x})^2 / \sum w`$, in two passes.
///
/// Returns `None` if the weights do not sum to a positive number.
pub fn weighted_mean_variance<I>(values: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = (f64, f64)> + Clone,
{
    let mut acc = WeightedMoments::default();
    let mut first = None;
    let mut constant = true;
    for (x, w) in values.clone() {
        acc.push(x, w);
        match first {
            None => first = Some(x),
            Some(x0) => constant &= x == x0,
        }
    }
    let mean = acc.mean()?;
    // Avoid reporting rounding noise as spread
    if constant {
        return first.map(|x0| (x0, 0.0));
    }
    let spread: f64 = values
        .into_iter()
        .map(|(x, w)| w * (x - mean).powi(2))
        .sum();
    Some((mean, spread / acc.weight))
}

/// The arithmetic mean of `values`, or `None` if it is empty
pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let (total, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(total, n), x| (total + x, n + 1));
    if n == 0 {
        None
    } else {
        Some(total / n as f64)
    }
}
