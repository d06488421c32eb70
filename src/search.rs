use std::cmp::Ordering;

use num_traits::Float;

#[inline]
fn cmp_float<T: Float>(a: &T, b: &T) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Less)
}

/// The index of the first element of the sorted `array` that is not less than `q`
pub fn lower_bound<T: Float>(array: &[T], q: T) -> usize {
    array.partition_point(|x| cmp_float(x, &q) == Ordering::Less)
}

/// The index of the first element of the sorted `array` that is greater than `q`
pub fn upper_bound<T: Float>(array: &[T], q: T) -> usize {
    array.partition_point(|x| cmp_float(x, &q) != Ordering::Greater)
}

/// The half-open index range of the sorted `array` whose values lie in `[lo, hi]`
pub fn find_between<T: Float>(array: &[T], lo: T, hi: T) -> (usize, usize) {
    let start = lower_bound(array, lo);
    let end = upper_bound(array, hi);
    if start > end {
        (start, start)
    } else {
        (start, end)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_bounds() {
        let xs = [1.0, 2.0, 2.0, 2.0, 3.0, 5.0];
        assert_eq!(lower_bound(&xs, 2.0), 1);
        assert_eq!(upper_bound(&xs, 2.0), 4);
        assert_eq!(lower_bound(&xs, 0.0), 0);
        assert_eq!(upper_bound(&xs, 9.0), 6);
        assert_eq!(find_between(&xs, 2.0, 4.0), (1, 5));
        assert_eq!(find_between(&xs, 4.0, 2.0), (5, 5));
        assert_eq!(find_between::<f64>(&[], 0.0, 1.0), (0, 0));
    }
}
