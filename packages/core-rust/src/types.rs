use std::any::{type_name, TypeId};
use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Generates a string-backed identifier newtype.
///
/// Identifiers are `Cow<'static, str>` so well-known values can be declared as
/// `const` items while runtime values (parsed from requests or config) stay owned.
macro_rules! string_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Cow<'static, str>);

        impl $name {
            /// Creates an identifier from a static string. Usable in `const` items.
            #[must_use]
            pub const fn from_static(value: &'static str) -> Self {
                Self(Cow::Borrowed(value))
            }

            /// Creates an identifier from any owned or borrowed string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(Cow::Owned(value.into()))
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&'static str> for $name {
            fn from(value: &'static str) -> Self {
                Self::from_static(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(Cow::Owned(value))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Category of workflow a request belongs to. Selects a `BusinessDefinition`.
    BusinessType
);

string_id!(
    /// Operation requested within a business type. Selects a handler and its guards.
    Action
);

string_id!(
    /// Identifier under which an interceptor instance is registered with a resolver.
    InterceptorId
);

/// Runtime tag for the input/output payload types of a type-erased value.
///
/// Definitions and interceptors are stored behind `dyn Any`; the tag is checked
/// before every downcast so a mismatch surfaces as a typed error naming both
/// sides instead of an opaque `None`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PayloadTypes {
    input: TypeId,
    output: TypeId,
    input_name: &'static str,
    output_name: &'static str,
}

impl PayloadTypes {
    /// Tag for a `(T, R)` input/output pair.
    #[must_use]
    pub fn of<T: 'static, R: 'static>() -> Self {
        Self {
            input: TypeId::of::<T>(),
            output: TypeId::of::<R>(),
            input_name: type_name::<T>(),
            output_name: type_name::<R>(),
        }
    }

    /// Returns `true` if this tag describes the `(T, R)` pair.
    #[must_use]
    pub fn matches<T: 'static, R: 'static>(&self) -> bool {
        self.input == TypeId::of::<T>() && self.output == TypeId::of::<R>()
    }

    #[must_use]
    pub fn input_name(&self) -> &'static str {
        self.input_name
    }

    #[must_use]
    pub fn output_name(&self) -> &'static str {
        self.output_name
    }
}

impl fmt::Debug for PayloadTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for PayloadTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} -> {})", self.input_name, self.output_name)
    }
}
