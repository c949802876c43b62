//! Decoding of binary scalar responses.
//!
//! Count probes and aggregate statistics are fetched with a binary
//! save format, so the body is a fixed number of little-endian values
//! rather than text. Anything of the wrong length is a protocol error.

use scidb_common::{AttributeStats, ShimError, ShimResult};

pub fn decode_u64(bytes: &[u8]) -> ShimResult<u64> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| ShimError::BinaryLength {
        expected: 8,
        actual: bytes.len(),
    })?;
    Ok(u64::from_le_bytes(arr))
}

pub fn decode_i64(bytes: &[u8]) -> ShimResult<i64> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| ShimError::BinaryLength {
        expected: 8,
        actual: bytes.len(),
    })?;
    Ok(i64::from_le_bytes(arr))
}

/// Decode the `(double,double,double,double)` statistics record.
pub fn decode_stats(bytes: &[u8]) -> ShimResult<AttributeStats> {
    if bytes.len() != 32 {
        return Err(ShimError::BinaryLength {
            expected: 32,
            actual: bytes.len(),
        });
    }
    let f = |i: usize| {
        let mut arr = [0u8; 8];
        arr.copy_from_slice(&bytes[i * 8..(i + 1) * 8]);
        f64::from_le_bytes(arr)
    };
    Ok(AttributeStats {
        min: f(0),
        max: f(1),
        mean: f(2),
        stdev: f(3),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_scalars() {
        assert_eq!(decode_u64(&42u64.to_le_bytes()).unwrap(), 42);
        assert_eq!(decode_i64(&(-7i64).to_le_bytes()).unwrap(), -7);
    }

    #[test]
    fn test_decode_wrong_length() {
        assert!(matches!(
            decode_u64(&[0; 4]),
            Err(ShimError::BinaryLength {
                expected: 8,
                actual: 4
            })
        ));
        assert!(matches!(
            decode_stats(&[0; 16]),
            Err(ShimError::BinaryLength { .. })
        ));
    }

    #[test]
    fn test_decode_stats() {
        let mut bytes = Vec::new();
        for v in [0.0f64, 255.0, 127.5, 10.25] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let s = decode_stats(&bytes).unwrap();
        assert_eq!(s.min, 0.0);
        assert_eq!(s.max, 255.0);
        assert_eq!(s.mean, 127.5);
        assert_eq!(s.stdev, 10.25);
    }
}
