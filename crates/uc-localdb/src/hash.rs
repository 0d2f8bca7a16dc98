//! Domain hashing for database lookups
//!
//! Database entries and public-suffix rules are keyed by a 64-bit composite
//! of two Murmur3 32-bit passes with different seeds.

/// 64-bit domain key represented as two 32-bit parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DomainKey {
    pub lo: u32,
    pub hi: u32,
}

impl DomainKey {
    #[inline]
    pub const fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi }
    }

    /// Convert to a single u64 for use as a map key.
    #[inline]
    pub const fn to_u64(self) -> u64 {
        ((self.hi as u64) << 32) | (self.lo as u64)
    }
}

const SEED_LO: u32 = 0x9e3779b9; // Golden ratio
const SEED_HI: u32 = 0x85ebca6b; // Murmur3 constant

/// Murmur3 32-bit hash.
#[inline]
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e2d51;
    const C2: u32 = 0x1b873593;

    let mut h = seed;
    let mut chunks = data.chunks_exact(4);

    for chunk in &mut chunks {
        let k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let k = k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
        h ^= k;
        h = h.rotate_left(13).wrapping_mul(5).wrapping_add(0xe6546b64);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k: u32 = 0;
        for (i, &b) in tail.iter().enumerate() {
            k ^= (b as u32) << (8 * i);
        }
        h ^= k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
    }

    // Finalization
    h ^= data.len() as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;

    h
}

/// Hash a domain name, ignoring ASCII case and a trailing dot.
#[inline]
pub fn hash_domain(domain: &str) -> DomainKey {
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    let lowered: Vec<u8> = domain.bytes().map(|b| b.to_ascii_lowercase()).collect();
    DomainKey::new(murmur3_32(&lowered, SEED_LO), murmur3_32(&lowered, SEED_HI))
}

/// Map key for a domain name.
#[inline]
pub fn domain_key(domain: &str) -> u64 {
    hash_domain(domain).to_u64()
}
