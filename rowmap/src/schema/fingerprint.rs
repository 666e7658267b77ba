use std::fmt;

use xxhash_rust::xxh3::Xxh3;

use crate::schema::column::ColumnDef;

/// An order-sensitive summary of a result's column-name sequence.
///
/// Identical name sequences always hash identically; swapping two columns
/// changes the value. The fingerprint is a fast-path heuristic for schema
/// drift, not a correctness guarantee: two genuinely different schemas may
/// collide, in which case a stale plan is reused until its coercions fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub u64);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Computes the fingerprint of an ordered column list.
pub fn of_columns(columns: &[ColumnDef]) -> Fingerprint {
    of_names(columns.iter().map(|c| c.name.as_str()))
}

/// Computes the fingerprint of an ordered name sequence.
pub fn of_names<'a>(names: impl Iterator<Item = &'a str>) -> Fingerprint {
    let mut hasher = Xxh3::new();
    let mut count = 0_u64;
    for name in names {
        hasher.update(name.as_bytes());
        // Separator so that ["ab", "c"] and ["a", "bc"] differ.
        hasher.update(&[0xFF]);
        count += 1;
    }
    hasher.update(&count.to_le_bytes());
    Fingerprint(hasher.digest())
}
