//! Deterministic digests (versioned).
//!
//! Two consumers need stable, process-independent hashes:
//!
//! - schema fingerprints (`SchemaConfig::digest`), logged when a registry is
//!   loaded so runs can be correlated with the exact schema they used, and
//! - composite keys for associations that carry no natural identifier.
//!
//! Both use **FNV-1a 64-bit**. It is not a security primitive; it is an
//! identity tool. In particular it must never depend on `std`'s randomly
//! seeded `HashMap` hasher, or repeated ingestion across restarts would stop
//! producing the same keys.

/// Prefix used in serialized digests.
pub const DIGEST_V1_PREFIX: &str = "fnv1a64:";

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x00000100000001b3;

/// Incremental FNV-1a 64-bit hasher.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a64 {
    hash: u64,
}

impl Default for Fnv1a64 {
    fn default() -> Self {
        Self {
            hash: FNV_OFFSET_BASIS,
        }
    }
}

impl Fnv1a64 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.hash ^= (*b) as u64;
            self.hash = self.hash.wrapping_mul(FNV_PRIME);
        }
    }

    /// Write a length-prefixed field (`<len>:<bytes>`), so adjacent fields can
    /// never run into each other (`("ab","c")` ≠ `("a","bc")`).
    pub fn write_field(&mut self, s: &str) {
        self.write(s.len().to_string().as_bytes());
        self.write(b":");
        self.write(s.as_bytes());
    }

    pub fn finish(&self) -> u64 {
        self.hash
    }
}

/// Compute a v1 digest (FNV-1a 64-bit) over arbitrary bytes.
pub fn fnv1a64_digest_bytes(bytes: &[u8]) -> String {
    let mut h = Fnv1a64::new();
    h.write(bytes);
    format!("{DIGEST_V1_PREFIX}{:016x}", h.finish())
}

/// Lowercase, `_`-separated form of a type name, usable as a CURIE prefix.
///
/// `"drug to gene association"` → `"drug_to_gene_association"`.
pub fn type_slug(type_name: &str) -> String {
    let mut out = String::with_capacity(type_name.len());
    for c in type_name.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '-' {
            out.push(c.to_ascii_lowercase());
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        "_".to_string()
    } else {
        out
    }
}

/// Composite key for an association lacking a natural identifier.
///
/// Properties:
/// - deterministic across runs and process restarts
/// - endpoint order matters (`A→B` and `B→A` are different associations)
/// - `fields` must be given in schema-declared order, not record order
///
/// Output: `<type-slug>:<16 lowercase hex digits>`.
pub fn composite_key_v1(type_name: &str, endpoints: &[&str], fields: &[(&str, &str)]) -> String {
    let mut h = Fnv1a64::new();

    h.write(b"type=");
    h.write_field(type_name);
    h.write(b"|endpoints=");
    for endpoint in endpoints {
        h.write_field(endpoint);
    }
    h.write(b"|fields=");
    for (field, value) in fields {
        h.write_field(field);
        h.write_field(value);
    }

    format!("{}:{:016x}", type_slug(type_name), h.finish())
}
