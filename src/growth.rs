/// How the size of each internally acquired buffer is chosen.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrowthStrategy {
  /// Double the size of the most recently bound buffer, starting from the
  /// external buffer, and cap at the maximum buffer size.
  #[default]
  Geometric,
  /// Always use the maximum buffer size, or the external buffer's size when
  /// no maximum is configured.
  Constant,
}

impl GrowthStrategy {
  /// Size of the next internal buffer for a request of `request` bytes.
  ///
  /// `current` is the capacity of the buffer the pool is bound to, `initial`
  /// the size of the external buffer and `max` the optional cap. The result is
  /// always at least `request`: under geometric growth a request larger than
  /// the cap gets a buffer of exactly `request` bytes, and under constant
  /// growth a request larger than the constant size gets one too.
  pub fn next_buffer_size(
    self,
    current: usize,
    initial: usize,
    max: Option<usize>,
    request: usize,
  ) -> usize {
    match self {
      Self::Geometric => {
        let cap = max.unwrap_or(usize::MAX);
        let mut size = current.max(1).saturating_mul(2);

        while size < request && size < cap {
          size = size.saturating_mul(2);
        }

        size.min(cap).max(request)
      }
      Self::Constant => max.unwrap_or(initial).max(request),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_geometric_doubles() {
    let growth = GrowthStrategy::Geometric;

    assert_eq!(growth.next_buffer_size(8, 8, None, 8), 16);
    assert_eq!(growth.next_buffer_size(16, 8, None, 1), 32);
    assert_eq!(growth.next_buffer_size(32, 8, None, 32), 64);
  }

  #[test]
  fn test_geometric_grows_until_request_fits() {
    let growth = GrowthStrategy::Geometric;

    assert_eq!(growth.next_buffer_size(16, 16, None, 33), 64);
    assert_eq!(growth.next_buffer_size(16, 16, None, 1000), 1024);
  }

  #[test]
  fn test_geometric_clamps_to_max() {
    let growth = GrowthStrategy::Geometric;

    assert_eq!(growth.next_buffer_size(16, 16, Some(32), 16), 32);
    assert_eq!(growth.next_buffer_size(32, 16, Some(32), 16), 32);
    assert_eq!(growth.next_buffer_size(32, 16, Some(48), 1), 48);
    assert_eq!(growth.next_buffer_size(16, 16, Some(100), 90), 100);
  }

  #[test]
  fn test_geometric_request_over_max_gets_exact_size() {
    let growth = GrowthStrategy::Geometric;

    assert_eq!(growth.next_buffer_size(16, 16, Some(32), 100), 100);
    assert_eq!(growth.next_buffer_size(100, 16, Some(32), 1), 32);
  }

  #[test]
  fn test_geometric_saturates() {
    let growth = GrowthStrategy::Geometric;

    assert_eq!(
      growth.next_buffer_size(usize::MAX / 2 + 1, 1, None, 1),
      usize::MAX
    );
  }

  #[test]
  fn test_constant() {
    let growth = GrowthStrategy::Constant;

    assert_eq!(growth.next_buffer_size(16, 16, None, 4), 16);
    assert_eq!(growth.next_buffer_size(64, 16, None, 4), 16);
    assert_eq!(growth.next_buffer_size(16, 16, Some(128), 4), 128);
    assert_eq!(growth.next_buffer_size(16, 16, Some(128), 200), 200);
  }
}
