use num_traits::PrimInt;

/// Integer division rounding up, used for dispatch group counts.
pub fn div_up<T: PrimInt>(a: T, b: T) -> T {
    (a + b - T::one()) / b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_div_up() {
        assert_eq!(div_up(16u32, 8), 2);
        assert_eq!(div_up(17u32, 8), 3);
        assert_eq!(div_up(1u32, 8), 1);
        assert_eq!(div_up(0u32, 8), 0);
        assert_eq!(div_up(1281usize, 8), 161);
    }
}
