/// Arithmetic over the ring a [DWTHandler] is specialized for.
///
/// Implemented for modular integers (negacyclic NTT used by polynomial
/// multiplication) and for `Complex<f64>` (canonical embedding used by the
/// CKKS encoder).
pub trait Arithmetic: Clone {

    type Value: Copy;
    type Root;
    type Scalar;

    fn add(&self, a: &Self::Value, b: &Self::Value) -> Self::Value;
    fn sub(&self, a: &Self::Value, b: &Self::Value) -> Self::Value;
    fn mul_root(&self, a: &Self::Value, r: &Self::Root) -> Self::Value;
    fn mul_scalar(&self, a: &Self::Value, s: &Self::Scalar) -> Self::Value;

}

/// Fast discrete weighted transform and its inverse.
///
/// The forward direction is a Cooley-Tukey butterfly network that consumes
/// powers of a primitive 2n-th root of unity stored in bit-reversed order and
/// leaves its output in bit-reversed order. The backward direction is the
/// matching Gentleman-Sande network; the i-th entry of its root table holds the
/// (reverse_bits(i - 1) + 1)-th power of the inverse root so that every layer
/// reads a contiguous run. Any final 1/n (or other) scaling is applied through
/// the optional scalar.
#[derive(Clone, Default)]
pub struct DWTHandler<A: Arithmetic> {
    arithmetic: A
}

impl<A: Arithmetic> DWTHandler<A> {

    pub fn new(arithmetic: &A) -> Self {
        Self {arithmetic: arithmetic.clone()}
    }

    pub fn transform_to_rev(
        &self,
        values: &mut [A::Value],
        log_n: usize,
        roots: &[A::Root],
        scalar: Option<&A::Scalar>
    ) {
        let n = 1 << log_n;
        for layer in 0..log_n {
            let m = 1 << layer;
            let gap = n >> (1 + layer);
            for (block, r) in values.chunks_mut(2 * gap).zip(roots[m..2 * m].iter()) {
                let (left, right) = block.split_at_mut(gap);
                for (x, y) in left.iter_mut().zip(right.iter_mut()) {
                    let u = *x;
                    let v = self.arithmetic.mul_root(y, r);
                    *x = self.arithmetic.add(&u, &v);
                    *y = self.arithmetic.sub(&u, &v);
                }
            }
        }
        if let Some(scalar) = scalar {
            values.iter_mut().for_each(|x| *x = self.arithmetic.mul_scalar(x, scalar));
        }
    }

    pub fn transform_from_rev(
        &self,
        values: &mut [A::Value],
        log_n: usize,
        roots: &[A::Root],
        scalar: Option<&A::Scalar>
    ) {
        let n = 1 << log_n;
        for layer in 0..log_n {
            let gap = 1 << layer;
            let m = n >> (1 + layer);
            for (block, r) in values.chunks_mut(2 * gap).zip(roots[n - 2 * m + 1..n - m + 1].iter()) {
                let (left, right) = block.split_at_mut(gap);
                for (x, y) in left.iter_mut().zip(right.iter_mut()) {
                    let u = self.arithmetic.add(x, y);
                    let v = self.arithmetic.sub(x, y);
                    *x = u;
                    *y = self.arithmetic.mul_root(&v, r);
                }
            }
        }
        if let Some(scalar) = scalar {
            values.iter_mut().for_each(|x| *x = self.arithmetic.mul_scalar(x, scalar));
        }
    }

}
