use crate::{Error, Result};

/// Index of the largest score. Ties go to the lowest index.
pub fn argmax(scores: &[f32]) -> Result<usize> {
    let (first, rest) = scores.split_first()
        .ok_or_else(|| Error::Argument("cannot classify an empty score vector".to_string()))?;
    let mut best = (0, *first);
    for (i, score) in rest.iter().enumerate() {
        if *score > best.1 {
            best = (i + 1, *score);
        }
    }
    Ok(best.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax() {
        assert_eq!(2, argmax(&[5.0, 2.0, 9.0, 9.0, 1.0]).unwrap());
        assert_eq!(0, argmax(&[1.0]).unwrap());
        assert_eq!(0, argmax(&[3.0, 3.0, 3.0]).unwrap());
        assert_eq!(3, argmax(&[-4.0, -3.0, -2.0, -1.0]).unwrap());
        assert!(matches!(argmax(&[]), Err(Error::Argument(_))));
    }

    #[test]
    fn test_nan_never_wins() {
        assert_eq!(0, argmax(&[1.0, f32::NAN, 0.5]).unwrap());
        assert_eq!(2, argmax(&[1.0, f32::NAN, 1.5]).unwrap());
    }
}
