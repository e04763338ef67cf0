//! Slash-separated store paths

use std::fmt;

use super::StoreError;

/// Characters the hosted store refuses inside a key
const FORBIDDEN: &[char] = &['.', '#', '$', '[', ']'];

/// A parsed path such as `games/uno/lobby-42/playerHands/<id>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// The root of the tree
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a slash-separated path. Empty segments are ignored.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let mut segments = Vec::new();
        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            if segment.contains(FORBIDDEN) {
                return Err(StoreError::InvalidPath(raw.to_string()));
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Append a relative sub-path
    pub fn join(&self, sub: &str) -> Result<Self, StoreError> {
        let tail = Self::parse(sub)?;
        let mut segments = self.segments.clone();
        segments.extend(tail.segments);
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True when `self` equals `other` or is one of its ancestors
    pub fn is_prefix_of(&self, other: &StorePath) -> bool {
        self.segments.len() <= other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| a == b)
    }

    /// Deepest path that is a prefix of both
    pub fn common_prefix(&self, other: &StorePath) -> StorePath {
        let segments = self
            .segments
            .iter()
            .zip(other.segments.iter())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| a.clone())
            .collect();
        Self { segments }
    }

    /// True when a write at one path changes the value seen at the other
    pub fn overlaps(&self, other: &StorePath) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ignores_empty_segments() {
        let path = StorePath::parse("/games//uno/abc/").unwrap();
        assert_eq!(path.segments(), &["games", "uno", "abc"]);
        assert_eq!(path.to_string(), "games/uno/abc");
    }

    #[test]
    fn parse_rejects_forbidden_characters() {
        assert!(StorePath::parse("games/uno/a.b").is_err());
        assert!(StorePath::parse("games/$x").is_err());
    }

    #[test]
    fn overlap_is_symmetric_on_ancestors_only() {
        let game = StorePath::parse("games/uno/abc").unwrap();
        let hand = game.join("playerHands/p1").unwrap();
        let other = StorePath::parse("games/uno/xyz").unwrap();

        assert!(game.is_prefix_of(&hand));
        assert!(!hand.is_prefix_of(&game));
        assert!(game.overlaps(&hand));
        assert!(hand.overlaps(&game));
        assert!(!game.overlaps(&other));
        assert!(StorePath::root().overlaps(&other));
    }

    #[test]
    fn common_prefix_stops_at_first_difference() {
        let a = StorePath::parse("games/aow/m1/units").unwrap();
        let b = StorePath::parse("games/aow/m1/gold/p1").unwrap();
        assert_eq!(a.common_prefix(&b).to_string(), "games/aow/m1");
        assert_eq!(a.common_prefix(&a), a);
        let other = StorePath::parse("profiles/x").unwrap();
        assert_eq!(a.common_prefix(&other), StorePath::root());
    }
}
