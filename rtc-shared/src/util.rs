use rand::{Rng, rng};

/// Random string of `n` characters drawn from `runes`.
pub fn generate_crypto_random_string(n: usize, runes: &[u8]) -> String {
    let mut rng = rng();

    (0..n)
        .map(|_| {
            let idx = rng.random_range(0..runes.len());
            runes[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_random_string_uses_runes() {
        let tests = vec![(64, &b"abc"[..]), (16, &b"0123456789"[..]), (0, &b"x"[..])];

        for (n, runes) in tests {
            let s = generate_crypto_random_string(n, runes);
            assert_eq!(s.len(), n);
            assert!(s.bytes().all(|b| runes.contains(&b)));
        }
    }
}
