//! Tagged-union plumbing.
//!
//! Every polymorphic snapshot is stored as a `u32` discriminator plus a fixed
//! array of `u64` words. The words are only ever written from a typed Rust
//! enum and only ever read back through the discriminator, so a snapshot can
//! never carry a payload of the wrong kind.

use bytemuck::Pod;

/// Copy a Pod value into the front of a zeroed word array.
#[inline]
pub(crate) fn encode<T: Pod, const N: usize>(value: &T) -> [u64; N] {
    let mut words = [0u64; N];
    let src = bytemuck::bytes_of(value);
    assert!(src.len() <= N * 8, "payload does not fit");
    let dst: &mut [u8] = bytemuck::cast_slice_mut(&mut words);
    dst[..src.len()].copy_from_slice(src);
    words
}

/// Read a Pod value back from the front of a word array.
#[inline]
pub(crate) fn decode<T: Pod, const N: usize>(words: &[u64; N]) -> T {
    let bytes: &[u8] = bytemuck::cast_slice(words);
    bytemuck::pod_read_unaligned(&bytes[..std::mem::size_of::<T>()])
}

/// Placeholder payload for variants that carry no data.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EmptyPayload {
    _reserved: u64,
}

/// Declares a discriminator enum plus the matching payload enum.
///
/// Discriminator `0` is always `Unknown`, so a zeroed snapshot decodes to
/// "no payload" rather than to a variant full of null pointers.
macro_rules! tagged_payload {
    (
        $(#[$meta:meta])*
        $payload:ident, $tag:ident, words = $words:literal {
            $($variant:ident($data:ty) = $value:literal),+ $(,)?
        }
    ) => {
        /// Discriminator stored in the snapshot.
        #[repr(u32)]
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        pub enum $tag {
            #[default]
            Unknown = 0,
            $($variant = $value),+
        }

        impl $tag {
            /// Decode a raw discriminator; unrecognized values map to `Unknown`.
            pub const fn from_u32(v: u32) -> Self {
                match v {
                    $($value => Self::$variant,)+
                    _ => Self::Unknown,
                }
            }
        }

        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq)]
        pub enum $payload {
            $($variant($data)),+
        }

        $(const _: () = assert!(std::mem::size_of::<$data>() <= $words * 8);)+

        impl $payload {
            /// Number of payload words reserved in the snapshot.
            pub const WORDS: usize = $words;

            /// Discriminator for this payload.
            pub fn tag(&self) -> $tag {
                match self {
                    $(Self::$variant(_) => $tag::$variant),+
                }
            }

            #[allow(dead_code)]
            pub(crate) fn encode(&self) -> [u64; $words] {
                match self {
                    $(Self::$variant(d) => $crate::payload::encode(d)),+
                }
            }

            #[allow(dead_code)]
            pub(crate) fn decode(tag: u32, words: &[u64; $words]) -> Option<Self> {
                match $tag::from_u32(tag) {
                    $($tag::$variant => Some(Self::$variant($crate::payload::decode(words))),)+
                    $tag::Unknown => None,
                }
            }
        }
    };
}

pub(crate) use tagged_payload;

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    struct Pair {
        a: u32,
        b: f32,
    }

    #[test]
    fn test_encode_zero_fills_tail() {
        let words: [u64; 3] = encode(&Pair { a: 7, b: 1.5 });
        assert_eq!(words[1], 0);
        assert_eq!(words[2], 0);
        let back: Pair = decode(&words);
        assert_eq!(back, Pair { a: 7, b: 1.5 });
    }

    #[test]
    #[should_panic(expected = "payload does not fit")]
    fn test_encode_rejects_oversized() {
        let _: [u64; 0] = encode(&Pair { a: 1, b: 2.0 });
    }
}
