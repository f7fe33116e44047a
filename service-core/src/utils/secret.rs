use subtle::ConstantTimeEq;

/// Compare two secrets byte-for-byte in constant time.
///
/// Lengths are compared first; only the length of the expected value leaks.
pub fn secrets_match(expected: &str, provided: &str) -> bool {
    let expected_bytes = expected.as_bytes();
    let provided_bytes = provided.as_bytes();

    if expected_bytes.len() != provided_bytes.len() {
        return false;
    }

    expected_bytes.ct_eq(provided_bytes).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_secrets_match() {
        assert!(secrets_match("hunter2", "hunter2"));
    }

    #[test]
    fn different_secrets_do_not_match() {
        assert!(!secrets_match("hunter2", "hunter3"));
    }

    #[test]
    fn comparison_is_exact() {
        assert!(!secrets_match("hunter2", "hunter2 "));
        assert!(!secrets_match("hunter2", "HUNTER2"));
        assert!(!secrets_match("hunter2", ""));
    }
}
