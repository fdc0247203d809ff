/// Deterministic 32-bit shuffle PRNG.
///
/// The seed hash and the stepper constants below are part of the protocol
/// contract: a seed must produce the same deal on every implementation, so
/// replays and cross-server reconstructions agree card-for-card.
#[derive(Debug, Clone)]
pub struct ShuffleRng {
    state: u32,
}

/// A shuffle seed, supplied as free text or a plain integer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Seed {
    Text(String),
    Number(u64),
}

impl Seed {
    fn digest(&self) -> u32 {
        match self {
            Seed::Text(s) => seed_hash(s),
            Seed::Number(n) => seed_hash(&n.to_string()),
        }
    }
}

impl From<&str> for Seed {
    fn from(s: &str) -> Self {
        Seed::Text(s.to_string())
    }
}
impl From<u64> for Seed {
    fn from(n: u64) -> Self {
        Seed::Number(n)
    }
}

/// Folds seed bytes into a 32-bit state.
/// Per-byte: xor, multiply by 0x85EB_CA6B, xor-shift 13, multiply by
/// 0xC2B2_AE35, xor-shift 16; finalized by adding 0x9E37_79B9.
fn seed_hash(text: &str) -> u32 {
    let mut h: u32 = 0;
    for b in text.bytes() {
        h = (h ^ b as u32).wrapping_mul(0x85EB_CA6B);
        h ^= h >> 13;
        h = h.wrapping_mul(0xC2B2_AE35);
        h ^= h >> 16;
    }
    h.wrapping_add(0x9E37_79B9)
}

impl ShuffleRng {
    pub fn new(seed: &Seed) -> Self {
        Self {
            state: seed.digest(),
        }
    }
    /// Next uniform value in `[0, 1)` (mulberry32 step).
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        (t ^ (t >> 14)) as f64 / 4_294_967_296.0
    }
    /// Fisher–Yates over a slice, last index down to 1.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = (self.next_f64() * (i + 1) as f64) as usize;
            items.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn identical_seeds_identical_streams() {
        let mut a = ShuffleRng::new(&Seed::from("seed-1"));
        let mut b = ShuffleRng::new(&Seed::from("seed-1"));
        for _ in 0..64 {
            assert_eq!(a.next_f64(), b.next_f64());
        }
    }
    #[test]
    fn distinct_seeds_diverge() {
        let mut a = ShuffleRng::new(&Seed::from("seed-1"));
        let mut b = ShuffleRng::new(&Seed::from("seed-2"));
        let same = (0..16).filter(|_| a.next_f64() == b.next_f64()).count();
        assert!(same < 16);
    }
    #[test]
    fn numeric_seed_matches_decimal_text() {
        let mut a = ShuffleRng::new(&Seed::from(42u64));
        let mut b = ShuffleRng::new(&Seed::from("42"));
        assert_eq!(a.next_f64(), b.next_f64());
    }
    #[test]
    fn values_in_unit_interval() {
        let mut rng = ShuffleRng::new(&Seed::from("range"));
        for _ in 0..1000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }
    #[test]
    fn shuffle_is_deterministic_permutation() {
        let deck: Vec<u8> = (0..47).collect();
        let mut a = deck.clone();
        let mut b = deck.clone();
        ShuffleRng::new(&Seed::from("seed-1")).shuffle(&mut a);
        ShuffleRng::new(&Seed::from("seed-1")).shuffle(&mut b);
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(sorted, deck);
    }
}
