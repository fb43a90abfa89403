// Integer helpers for address and stride arithmetic.

pub fn ceil_div(value: usize, divisor: usize) -> usize {
    if divisor == 0 {
        return 0;
    }
    value.div_ceil(divisor)
}

/// Rounds towards negative infinity, unlike `/` which truncates.
pub fn int_floor(numerator: isize, denominator: isize) -> isize {
    let quotient = numerator / denominator;
    if (numerator % denominator != 0) && ((numerator < 0) != (denominator < 0)) {
        quotient - 1
    } else {
        quotient
    }
}

/// Rounds towards positive infinity.
pub fn int_ceil(numerator: isize, denominator: isize) -> isize {
    let quotient = numerator / denominator;
    if (numerator % denominator != 0) && ((numerator < 0) == (denominator < 0)) {
        quotient + 1
    } else {
        quotient
    }
}

pub fn round_up(value: usize, multiple: usize) -> usize {
    ceil_div(value, multiple) * multiple
}

pub fn product(values: &[usize]) -> usize {
    values.iter().product()
}
