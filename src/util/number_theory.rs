use crate::Modulus;

// Witnesses that make Miller-Rabin deterministic for every 64-bit input.
const MILLER_RABIN_BASES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

const TRY_PRIMITIVE_ROOT_NUM_ROUNDS: u64 = 1 << 16;

#[inline]
fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exponent: u64, m: u64) -> u64 {
    let mut result = 1 % m;
    base %= m;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result = mul_mod(result, base, m);
        }
        base = mul_mod(base, base, m);
        exponent >>= 1;
    }
    result
}

pub fn gcd(mut x: u64, mut y: u64) -> u64 {
    while y != 0 {
        let t = x % y;
        x = y;
        y = t;
    }
    x
}

/// Extended GCD. Returns (gcd, a, b) with gcd = a * x + b * y.
pub fn xgcd(x: u64, y: u64) -> (u64, i64, i64) {
    let (mut old_r, mut r) = (x as i128, y as i128);
    let (mut old_s, mut s) = (1i128, 0i128);
    let (mut old_t, mut t) = (0i128, 1i128);
    while r != 0 {
        let quotient = old_r / r;
        (old_r, r) = (r, old_r - quotient * r);
        (old_s, s) = (s, old_s - quotient * s);
        (old_t, t) = (t, old_t - quotient * t);
    }
    (old_r as u64, old_s as i64, old_t as i64)
}

pub fn try_invert_u64_mod_u64(value: u64, modulus: u64) -> Option<u64> {
    if value == 0 || modulus < 2 {return None;}
    let (cd, a, _) = xgcd(value % modulus, modulus);
    if cd != 1 {
        None
    } else if a < 0 {
        Some((modulus as i128 + a as i128) as u64)
    } else {
        Some(a as u64)
    }
}

pub fn is_prime(value: u64) -> bool {
    if value < 2 {return false;}
    for &p in MILLER_RABIN_BASES.iter() {
        if value == p {return true;}
        if value % p == 0 {return false;}
    }
    // Find r and odd d that satisfy value = 2^r * d + 1.
    let mut d = value - 1;
    let mut r = 0;
    while (d & 1) == 0 {d >>= 1; r += 1;}
    'witness: for &a in MILLER_RABIN_BASES.iter() {
        let mut x = pow_mod(a, d, value);
        if x == 1 || x == value - 1 {continue;}
        for _ in 1..r {
            x = mul_mod(x, x, value);
            if x == value - 1 {continue 'witness;}
        }
        return false;
    }
    true
}

pub fn is_primitive_root(root: u64, degree: u64, modulus: &Modulus) -> bool {
    if root == 0 {
        false
    } else {
        // For a power-of-two degree it suffices to check root^(degree/2) == -1.
        modulus.pow(root, degree >> 1) == modulus.value() - 1
    }
}

/// Smallest primitive degree-th root of unity modulo a prime.
///
/// The search is deterministic so that every party holding the same
/// parameters derives identical NTT tables.
pub fn try_minimal_primitive_root(degree: u64, modulus: &Modulus) -> Option<u64> {
    if degree < 2 || !modulus.is_prime() {return None;}
    let size_entire_group = modulus.value() - 1;
    if size_entire_group % degree != 0 {return None;}
    let size_quotient_group = size_entire_group / degree;

    let mut root = None;
    for candidate in 2..TRY_PRIMITIVE_ROOT_NUM_ROUNDS.min(modulus.value()) {
        let attempt = modulus.pow(candidate, size_quotient_group);
        if is_primitive_root(attempt, degree, modulus) {
            root = Some(attempt);
            break;
        }
    }
    let root = root?;

    // Every odd power of a primitive root is again primitive; keep the smallest.
    let generator_sq = modulus.mul(root, root);
    let mut current = root;
    let mut minimal = root;
    for _ in 0..(degree / 2) {
        if current < minimal {minimal = current;}
        current = modulus.mul(current, generator_sq);
    }
    Some(minimal)
}
