//! A field that distinguishes "not specified" from "specified as the zero value".

use serde::{Serialize, Serializer};

/// An optional scalar that keeps track of whether it was explicitly specified.
///
/// Unlike `Option`, there is no `From<T>` conversion: a `TriState` can only become
/// [`TriState::Present`] through [`TriState::set`] (or by naming the variant), so a call site
/// cannot accidentally produce a present zero value where it meant "unset", or vice versa. A
/// present `false` or `0` is as meaningful as any other value.
///
/// Records containing `TriState` fields skip absent ones when serializing with
/// `#[serde(skip_serializing_if = "TriState::is_absent")]`; present values always serialize,
/// regardless of how falsy they are.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TriState<T> {
    /// No value was specified.
    #[default]
    Absent,

    /// A value was explicitly specified.
    Present(T),
}

impl<T> TriState<T> {
    /// Explicitly sets a value.
    pub fn set(value: T) -> Self {
        Self::Present(value)
    }

    /// Whether a value was specified.
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Whether no value was specified.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Returns a reference to the specified value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent => None,
        }
    }

    /// Returns the specified value, or `default` if none was specified.
    pub fn value_or(self, default: T) -> T {
        match self {
            Self::Present(value) => value,
            Self::Absent => default,
        }
    }

    /// Converts from `&TriState<T>` to `TriState<&T>`.
    pub fn as_ref(&self) -> TriState<&T> {
        match self {
            Self::Present(value) => TriState::Present(value),
            Self::Absent => TriState::Absent,
        }
    }

    /// Maps a present value with `f`, leaving an absent one absent.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TriState<U> {
        match self {
            Self::Present(value) => TriState::Present(f(value)),
            Self::Absent => TriState::Absent,
        }
    }

    /// Converts into an `Option`, losing nothing but the type-level reminder that `None` means
    /// "unspecified".
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent => None,
        }
    }
}

impl<T: PartialEq> TriState<T> {
    /// Whether a value was specified and equals `other`.
    pub fn is_present_and_eq(&self, other: &T) -> bool {
        self.value() == Some(other)
    }
}

impl<T: Serialize> Serialize for TriState<T> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Present(value) => value.serialize(serializer),
            Self::Absent => serializer.serialize_none(),
        }
    }
}
