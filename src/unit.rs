use std::fmt;

/// The value produced by futures which carry no meaningful result.
///
/// Result-less computations store a `Unit` in their erased result slot, so
/// that they share one code path with result-bearing computations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Unit;

impl Unit {
    /// The one `Unit` value
    pub const INSTANCE: Unit = Unit;
}

impl From<()> for Unit {
    fn from(_: ()) -> Self {
        Unit
    }
}

impl From<Unit> for () {
    fn from(_: Unit) {}
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("()")
    }
}

#[cfg(test)]
mod tests {
    use super::Unit;

    #[test]
    fn unit_is_a_singleton() {
        assert_eq!(Unit::INSTANCE, Unit::default());
        assert_eq!(Unit::from(()), Unit);
        assert_eq!(std::mem::size_of::<Unit>(), 0);
        assert_eq!(Unit.to_string(), "()");
    }
}
