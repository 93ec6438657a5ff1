use std::mem;

/// The platform's maximum fundamental alignment.
///
/// Every block acquired from a backing allocator starts on this boundary, and
/// it caps the alignment applied under [`AlignmentStrategy::Natural`].
#[cfg(any(target_os = "linux", target_os = "android"))]
pub const MAX_ALIGN: usize = mem::align_of::<libc::max_align_t>();

/// The platform's maximum fundamental alignment.
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub const MAX_ALIGN: usize = 2 * mem::size_of::<usize>();

/// Rounds `value` up to the platform's maximum alignment.
///
/// # Examples
///
/// ```rust
/// use seqpool::{align, align::MAX_ALIGN};
///
/// assert_eq!(align!(1), MAX_ALIGN);
/// assert_eq!(align!(MAX_ALIGN), MAX_ALIGN);
/// assert_eq!(align!(MAX_ALIGN + 1), 2 * MAX_ALIGN);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, $crate::align::MAX_ALIGN)
  };
}

/// Rounds `value` up to a multiple of `alignment`, which must be a power of two.
///
/// # Examples
///
/// ```rust
/// use seqpool::align_to;
///
/// assert_eq!(align_to!(13, 8), 16);
/// assert_eq!(align_to!(16, 8), 16);
/// assert_eq!(align_to!(0, 4), 0);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $alignment:expr) => {
    ($value + $alignment - 1) & !($alignment - 1)
  };
}

/// How the addresses handed out by an arena are aligned.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlignmentStrategy {
  /// Align to the largest power of two not exceeding the request size,
  /// capped at [`MAX_ALIGN`]. Small requests waste less padding.
  #[default]
  Natural,
  /// Align every address to [`MAX_ALIGN`], whatever the request size.
  Maximum,
}

impl AlignmentStrategy {
  /// Returns the alignment a request of `size` bytes receives.
  ///
  /// ```rust
  /// use seqpool::{AlignmentStrategy, align::MAX_ALIGN};
  ///
  /// assert_eq!(AlignmentStrategy::Natural.alignment_for(1), 1);
  /// assert_eq!(AlignmentStrategy::Natural.alignment_for(6), 4);
  /// assert_eq!(AlignmentStrategy::Maximum.alignment_for(1), MAX_ALIGN);
  /// ```
  pub const fn alignment_for(
    self,
    size: usize,
  ) -> usize {
    match self {
      Self::Natural => natural_alignment(size),
      Self::Maximum => MAX_ALIGN,
    }
  }
}

/// Largest power of two not exceeding `size`, capped at [`MAX_ALIGN`].
pub const fn natural_alignment(size: usize) -> usize {
  if size == 0 {
    return 1;
  }

  let alignment = 1 << (usize::BITS - 1 - size.leading_zeros());

  if alignment > MAX_ALIGN {
    MAX_ALIGN
  } else {
    alignment
  }
}

/// Number of bytes to skip from `address` to reach the next multiple of
/// `alignment`.
pub const fn alignment_offset(
  address: usize,
  alignment: usize,
) -> usize {
  debug_assert!(alignment.is_power_of_two());

  address.wrapping_neg() & (alignment - 1)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_max_align_is_power_of_two() {
    assert!(MAX_ALIGN.is_power_of_two());
    assert!(MAX_ALIGN >= mem::align_of::<u64>());
    assert!(MAX_ALIGN >= mem::align_of::<f64>());
    assert!(MAX_ALIGN >= mem::align_of::<usize>());
  }

  #[test]
  fn test_align() {
    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (MAX_ALIGN * i + 1)..=(MAX_ALIGN * (i + 1));

      let expected_alignment = MAX_ALIGN * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
      }
    }
  }

  #[test]
  fn test_align_to() {
    assert_eq!(align_to!(0usize, 8), 0);
    assert_eq!(align_to!(1usize, 8), 8);
    assert_eq!(align_to!(8usize, 8), 8);
    assert_eq!(align_to!(9usize, 8), 16);
    assert_eq!(align_to!(3usize, 1), 3);
  }

  #[test]
  fn test_natural_alignment() {
    assert_eq!(natural_alignment(1), 1);
    assert_eq!(natural_alignment(2), 2);
    assert_eq!(natural_alignment(3), 2);
    assert_eq!(natural_alignment(4), 4);
    assert_eq!(natural_alignment(7), 4);
    assert_eq!(natural_alignment(8), 8.min(MAX_ALIGN));
    assert_eq!(natural_alignment(1024), MAX_ALIGN);
    assert_eq!(natural_alignment(usize::MAX), MAX_ALIGN);
  }

  #[test]
  fn test_maximum_strategy_ignores_size() {
    for size in [1, 2, 3, 5, 100, 4096] {
      assert_eq!(AlignmentStrategy::Maximum.alignment_for(size), MAX_ALIGN);
    }
  }

  #[test]
  fn test_alignment_offset() {
    assert_eq!(alignment_offset(0, 8), 0);
    assert_eq!(alignment_offset(1, 8), 7);
    assert_eq!(alignment_offset(7, 8), 1);
    assert_eq!(alignment_offset(8, 8), 0);
    assert_eq!(alignment_offset(13, 4), 3);
    assert_eq!(alignment_offset(13, 1), 0);
  }
}
