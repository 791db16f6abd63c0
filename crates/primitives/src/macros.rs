/// Generates the API of a 32-byte identifier newtype a la `struct Foo([u8; 32]);`.
///
/// Provides constructors, byte accessors, conversions, hex `Display`/`Debug`/`FromStr` and a
/// serde representation as a hex string.
macro_rules! impl_buf32 {
    ($name:ident) => {
        impl $name {
            pub const fn new(data: [u8; 32]) -> Self {
                Self(data)
            }

            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl ::std::convert::AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl ::std::convert::From<[u8; 32]> for $name {
            fn from(data: [u8; 32]) -> Self {
                Self(data)
            }
        }

        impl ::std::convert::From<$name> for [u8; 32] {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl<'a> ::std::convert::TryFrom<&'a [u8]> for $name {
            type Error = $crate::errors::ParseError;

            fn try_from(value: &'a [u8]) -> Result<Self, Self::Error> {
                <[u8; 32]>::try_from(value)
                    .map(Self)
                    .map_err(|_| $crate::errors::ParseError::InvalidLength {
                        expected: 32,
                        actual: value.len(),
                    })
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&::hex::encode(self.0))
            }
        }

        impl ::core::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}({})", stringify!($name), ::hex::encode(self.0))
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::errors::ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = <[u8; 32] as ::hex::FromHex>::from_hex(s)?;
                Ok(Self(bytes))
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&::hex::encode(self.0))
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                s.parse().map_err(::serde::de::Error::custom)
            }
        }
    };
}
