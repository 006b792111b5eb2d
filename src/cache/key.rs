//! Structural keys for the resource cache.
//!
//! A key is an ordered sequence of primitive segments. Two keys with the
//! same segment sequence address the same slot; comparison is always
//! element-wise, never by identity.

use std::fmt;

/// One segment of a cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeySegment {
  Text(String),
  Number(u64),
}

impl From<&str> for KeySegment {
  fn from(value: &str) -> Self {
    KeySegment::Text(value.to_string())
  }
}

impl From<String> for KeySegment {
  fn from(value: String) -> Self {
    KeySegment::Text(value)
  }
}

impl From<&String> for KeySegment {
  fn from(value: &String) -> Self {
    KeySegment::Text(value.clone())
  }
}

impl From<u64> for KeySegment {
  fn from(value: u64) -> Self {
    KeySegment::Number(value)
  }
}

impl From<u32> for KeySegment {
  fn from(value: u32) -> Self {
    KeySegment::Number(value as u64)
  }
}

impl fmt::Display for KeySegment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      KeySegment::Text(text) => write!(f, "{}", text),
      KeySegment::Number(number) => write!(f, "{}", number),
    }
  }
}

/// Structural identifier for one cached value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CacheKey {
  segments: Vec<KeySegment>,
}

impl CacheKey {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a segment, builder style.
  pub fn push(mut self, segment: impl Into<KeySegment>) -> Self {
    self.segments.push(segment.into());
    self
  }

  pub fn segments(&self) -> &[KeySegment] {
    &self.segments
  }

  pub fn len(&self) -> usize {
    self.segments.len()
  }

  pub fn is_empty(&self) -> bool {
    self.segments.is_empty()
  }

  /// True when this key begins with all segments of `prefix`. A key of
  /// fewer segments addresses everything nested under it.
  pub fn starts_with(&self, prefix: &CacheKey) -> bool {
    self.segments.len() >= prefix.segments.len()
      && self.segments[..prefix.segments.len()] == prefix.segments[..]
  }
}

impl<S: Into<KeySegment>, const N: usize> From<[S; N]> for CacheKey {
  fn from(segments: [S; N]) -> Self {
    Self {
      segments: segments.into_iter().map(Into::into).collect(),
    }
  }
}

impl<S: Into<KeySegment>> FromIterator<S> for CacheKey {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    Self {
      segments: iter.into_iter().map(Into::into).collect(),
    }
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (index, segment) in self.segments.iter().enumerate() {
      if index > 0 {
        write!(f, "/")?;
      }
      write!(f, "{}", segment)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_structural_equality() {
    let first = CacheKey::from(["repository", "spaceships", "heart-of-gold"]);
    let second = CacheKey::new()
      .push("repository")
      .push("spaceships".to_string())
      .push("heart-of-gold");
    assert_eq!(first, second);
  }

  #[test]
  fn test_mixed_segment_types() {
    let key = CacheKey::new().push("users").push("").push(0u64);
    assert_eq!(key.len(), 3);
    assert_eq!(key.to_string(), "users//0");
  }

  #[test]
  fn test_starts_with() {
    let prefix = CacheKey::from(["repository", "spaceships", "heart-of-gold"]);
    let branches = prefix.clone().push("branches");
    let other = CacheKey::from(["repository", "spaceships", "titanic"]);

    assert!(branches.starts_with(&prefix));
    assert!(prefix.starts_with(&prefix));
    assert!(!other.starts_with(&prefix));
    assert!(!prefix.starts_with(&branches));
  }

  #[test]
  fn test_number_and_text_segments_differ() {
    let with_number = CacheKey::new().push("users").push(0u64);
    let with_text = CacheKey::new().push("users").push("0");
    assert_ne!(with_number, with_text);
  }
}
