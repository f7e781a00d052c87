//! Redemption code strings: normalization and generation.

use rand::Rng;

/// Symbols used for generated codes. `O`, `0`, `I`, `1` and `L` are left out
/// because they are easily confused when read aloud or retyped.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Length of generated codes.
pub const CODE_LENGTH: usize = 16;

/// Normalize a code as typed by a user: trim surrounding whitespace, uppercase.
///
/// # Examples
///
/// ```
/// use nexus_core::code::normalize;
/// assert_eq!(normalize("  x1 \n"), "X1");
/// ```
#[must_use]
pub fn normalize(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Generate a random code of [`CODE_LENGTH`] symbols from [`CODE_ALPHABET`].
///
/// Callers should pass a cryptographically secure generator such as
/// `rand::thread_rng()`.
#[must_use]
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_alphabet_has_no_confusable_symbols() {
        for c in b"O0I1L" {
            assert!(!CODE_ALPHABET.contains(c));
        }
        assert_eq!(CODE_ALPHABET.len(), 31);
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize("   \t"), "");
    }

    proptest! {
        #[test]
        fn generated_codes_are_already_normalized(seed in any::<u64>()) {
            use rand::SeedableRng;
            let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
            let code = generate(&mut rng);
            prop_assert_eq!(code.len(), CODE_LENGTH);
            prop_assert_eq!(normalize(&code), code.clone());
            prop_assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }

        #[test]
        fn normalize_is_idempotent(raw in "[ \\ta-zA-Z0-9]*") {
            let once = normalize(&raw);
            prop_assert_eq!(normalize(&once), once);
        }
    }
}
