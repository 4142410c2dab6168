//! Declaration sources used to attribute errors

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Where a binding, exposure or provider was declared.
///
/// Errors carry a trail of sources so a failure can be traced from the
/// declaration that produced it out to every boundary it crossed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
	/// A location in Rust source, usually captured with [`Source::caller`].
	Location {
		file: &'static str,
		line: u32,
		column: u32,
	},
	/// A free-form description, such as a module or plugin name.
	Declared(Arc<str>),
	/// No source information is available.
	Unknown,
}

impl Source {
	/// Captures the location of the caller.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_provision::Source;
	///
	/// let source = Source::caller();
	/// assert!(source.to_string().contains(".rs:"));
	/// ```
	#[track_caller]
	pub fn caller() -> Self {
		Self::from(Location::caller())
	}

	pub fn declared(description: impl Into<Arc<str>>) -> Self {
		Self::Declared(description.into())
	}

	pub fn is_unknown(&self) -> bool {
		matches!(self, Self::Unknown)
	}
}

impl From<&'static Location<'static>> for Source {
	fn from(location: &'static Location<'static>) -> Self {
		Self::Location {
			file: location.file(),
			line: location.line(),
			column: location.column(),
		}
	}
}

impl fmt::Display for Source {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Location { file, line, column } => write!(f, "{}:{}:{}", file, line, column),
			Self::Declared(description) => f.write_str(description),
			Self::Unknown => f.write_str("[unknown source]"),
		}
	}
}
