/// Error for a priority label outside the wire vocabulary.
///
/// Callers at the protocol boundary are expected to treat this as
/// non-fatal and fall back to [`Priority::Normal`](crate::Priority).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown priority: {0:?}")]
pub struct UnknownPriority(pub String);
