pub const HE_MOD_BIT_COUNT_MAX: usize = 61;

pub const HE_POLY_MOD_DEGREE_MAX: usize = 131072;
pub const HE_POLY_MOD_DEGREE_MIN: usize = 2;

pub const HE_PRNG_SEED_BYTES: usize = 64;

// Generator of the cyclic subgroup of (Z/2NZ)* used to order the CKKS slots.
pub const GALOIS_GENERATOR: usize = 3;

#[inline]
pub fn get_significant_bit_count(value: u64) -> usize {
    if value == 0 {0}
    else {64 - value.leading_zeros() as usize}
}

#[inline]
pub fn get_power_of_two(value: u64) -> isize {
    if value == 0 || (value & (value - 1)) != 0 {-1}
    else {63 - value.leading_zeros() as isize}
}

#[inline]
pub fn reverse_bits_u64(operand: u64, bit_count: usize) -> u64 {
    if bit_count == 0 {
        0
    } else {
        operand.reverse_bits() >> (64 - bit_count)
    }
}

pub fn are_close_f64(value1: f64, value2: f64) -> bool {
    let scale_factor = value1.max(value2).max(1.0);
    (value1 - value2).abs() < f64::EPSILON * scale_factor
}

#[inline]
pub fn hamming_weight(x: u8) -> i32 {
    x.count_ones() as i32
}
