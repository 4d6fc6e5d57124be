//! Checked integer arithmetic that fails with an `ArithmeticException` fault.
//!
//! Business code uses these where an overflow must reach the caller as a
//! remote failure instead of wrapping silently.

use crate::Fault;

fn overflow(detail: &str, method: &str) -> Fault {
    Fault::arithmetic(detail).at("math", method)
}

pub fn add_exact(a: i64, b: i64) -> Result<i64, Fault> {
    a.checked_add(b).ok_or_else(|| overflow("long overflow", "add_exact"))
}

pub fn subtract_exact(a: i64, b: i64) -> Result<i64, Fault> {
    a.checked_sub(b).ok_or_else(|| overflow("long overflow", "subtract_exact"))
}

pub fn multiply_exact(a: i64, b: i64) -> Result<i64, Fault> {
    a.checked_mul(b).ok_or_else(|| overflow("long overflow", "multiply_exact"))
}

pub fn add_exact_int(a: i32, b: i32) -> Result<i32, Fault> {
    a.checked_add(b).ok_or_else(|| overflow("integer overflow", "add_exact_int"))
}

pub fn to_int_exact(v: i64) -> Result<i32, Fault> {
    i32::try_from(v).map_err(|_| overflow("integer overflow", "to_int_exact"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_reports_the_primitive_frame() {
        let fault = add_exact(i64::MAX, 1024).unwrap_err();
        assert_eq!(fault.message(), "ArithmeticException: long overflow");
        assert_eq!(fault.frames[0].owner, "math");
        assert_eq!(fault.frames[0].method, "add_exact");
    }

    #[test]
    fn test_in_range_values_pass_through() {
        assert_eq!(add_exact(1, 2).unwrap(), 3);
        assert_eq!(multiply_exact(-4, 5).unwrap(), -20);
        assert_eq!(to_int_exact(-7).unwrap(), -7);
        assert!(to_int_exact(i64::from(i32::MAX) + 1).is_err());
        assert!(subtract_exact(i64::MIN, 1).is_err());
        assert!(add_exact_int(i32::MAX, 1).is_err());
    }
}
