use std::fmt;

/// Why a connection attempt was refused. Carried back to the gateway so it
/// can choose a close code / status without re-deriving the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
	SourceRateLimited,
	GlobalRateLimited,
	CapacityExceeded,
}

impl fmt::Display for RejectReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::SourceRateLimited => write!(f, "source rate limit exceeded"),
			Self::GlobalRateLimited => write!(f, "global rate limit exceeded"),
			Self::CapacityExceeded => write!(f, "global capacity exceeded"),
		}
	}
}

/// Outcome of an admission check. Not a `Result` because rejection is an
/// expected, frequent outcome rather than a failure of the check itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
	Allowed,
	Rejected(RejectReason),
}

impl Decision {
	#[must_use]
	pub const fn is_allowed(self) -> bool {
		matches!(self, Self::Allowed)
	}
}
