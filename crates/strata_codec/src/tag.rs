//! Wire tags.
//!
//! Every encoded value starts with a single tag byte. Byte strings have no
//! tag of their own: the first digit of their decimal length routes them.

/// List opener.
pub const LIST: u8 = b'l';
/// Mapping opener.
pub const MAP: u8 = b'd';
/// Integer opener.
pub const INTEGER: u8 = b'i';
/// Boolean opener.
pub const BOOL: u8 = b'b';
/// Embedded JSON document.
pub const JSON: u8 = b'j';
/// UTF-8 string.
pub const UNICODE: u8 = b'u';
/// Compressed document.
pub const COMPRESSED: u8 = b'z';
/// Lazy sequence.
pub const LAZY: u8 = b'y';
/// Terminator for lists, mappings and integers.
pub const END: u8 = b'e';
/// Separator between a length prefix and its payload.
pub const COLON: u8 = b':';

/// Decoded form of a tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// `l`
    List,
    /// `d`
    Map,
    /// `i`
    Integer,
    /// `b`
    Bool,
    /// `j`
    Json,
    /// `u`
    Unicode,
    /// `z`
    Compressed,
    /// `y`
    Lazy,
    /// `0`-`9`: the byte is the first digit of the length.
    Bytes,
}

impl Tag {
    /// Map a tag byte to its decoder, or `None` if the byte is not a tag.
    pub fn from_byte(byte: u8) -> Option<Tag> {
        match byte {
            LIST => Some(Tag::List),
            MAP => Some(Tag::Map),
            INTEGER => Some(Tag::Integer),
            BOOL => Some(Tag::Bool),
            JSON => Some(Tag::Json),
            UNICODE => Some(Tag::Unicode),
            COMPRESSED => Some(Tag::Compressed),
            LAZY => Some(Tag::Lazy),
            b'0'..=b'9' => Some(Tag::Bytes),
            _ => None,
        }
    }

    /// Whether the tag byte is followed by a length prefix and raw payload.
    pub fn is_sized(self) -> bool {
        matches!(
            self,
            Tag::Bytes | Tag::Json | Tag::Unicode | Tag::Compressed | Tag::Lazy
        )
    }
}
