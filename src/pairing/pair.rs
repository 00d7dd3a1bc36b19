use std::fmt;

use serde::Serialize;

/// Order-independent key for a symmetric relationship between two users.
///
/// `lo < hi` under byte-wise string order, the same order sqlite's default
/// collation uses for the `user_id_1 < user_id_2` checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CanonicalPair {
    lo: String,
    hi: String,
}

impl CanonicalPair {
    /// `None` when both ids are the same user.
    pub fn new(a: &str, b: &str) -> Option<CanonicalPair> {
        match a.cmp(b) {
            std::cmp::Ordering::Less => Some(CanonicalPair { lo: a.to_owned(), hi: b.to_owned() }),
            std::cmp::Ordering::Greater => Some(CanonicalPair { lo: b.to_owned(), hi: a.to_owned() }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn lo(&self) -> &str {
        &self.lo
    }

    pub fn hi(&self) -> &str {
        &self.hi
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.lo == user_id || self.hi == user_id
    }
}

impl fmt::Display for CanonicalPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.lo, self.hi)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn orders_lexicographically() {
        let pair = CanonicalPair::new("u2", "u1").unwrap();
        assert_eq!((pair.lo(), pair.hi()), ("u1", "u2"));
        assert!(pair.contains("u2"));
        assert!(!pair.contains("u3"));
    }

    #[test]
    fn self_pair_is_rejected() {
        assert!(CanonicalPair::new("u1", "u1").is_none());
    }

    proptest! {
        #[test]
        fn symmetric(a in "[a-z0-9-]{1,12}", b in "[a-z0-9-]{1,12}") {
            prop_assume!(a != b);
            let ab = CanonicalPair::new(&a, &b).unwrap();
            let ba = CanonicalPair::new(&b, &a).unwrap();
            prop_assert_eq!(&ab, &ba);
            prop_assert!(ab.lo() < ab.hi());
        }
    }
}
