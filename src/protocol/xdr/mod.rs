//! XDR is a standard for the description and encoding of data.
//! It is useful for transferring data between different computer
//! architectures, and it has been used to communicate data between such
//! diverse machines as the SUN WORKSTATION*, VAX*, IBM-PC*, and Cray*
//!
//! <https://datatracker.ietf.org/doc/html/rfc4506>
//!
//! Its Rust-specific implementation is presented below.
//! Where appropriate, the standard types of the XDR language have
//! been replaced by similar types of the Rust language. For example,
//! the 32-bit `Integer` type was replaced by the `i32` type, and the
//! `opaque<>` type was replaced by `[u8]`. All the places where such
//! a replacement has been carried out have relevant comments.
//!
//! Decoding never trusts a length prefix for allocation: a length or tag
//! that points past the end of the input fails with
//! [`std::io::ErrorKind::UnexpectedEof`], and an enum or union tag with no
//! matching arm fails with [`std::io::ErrorKind::InvalidData`] carrying an
//! [`UnknownDiscriminant`] payload.

use std::io::{Read, Write};

use byteorder::BigEndian;
use byteorder::{ReadBytesExt, WriteBytesExt};
use num_traits::ToPrimitive;

pub mod mount;
pub mod nfs3;
pub mod portmap;
pub mod rpc;
mod utils;

pub use utils::{unknown_discriminant, UnknownDiscriminant};

/// XDR assumes big endian encoding.
pub type XDREndian = BigEndian;

/// Upper bound on the element count pre-allocated for a variable-length array.
const MAX_PREALLOCATED_ELEMENTS: usize = 1024;

pub trait Serialize {
    /// Serializes the implementing type to the provided writer.
    ///
    /// ## Parameters
    /// * `dest` - Where will the value be serialized to.
    ///
    /// ## Returns
    /// * `std::io::Result<()>` - Ok(()) on success, or an error if serialization fails.
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()>;
}

pub trait Deserialize {
    /// Deserializes data from the provided reader into the implementing type.
    ///
    /// ## Parameters
    /// * `src` - From where the value will be deserialized.
    ///
    /// ## Returns
    /// * `std::io::Result<()>` - Ok(()) on success, or an error if deserialization fails.
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()>;
}

/// Deserialization based on the [Default] trait of the type T.
///
/// # Parameters
/// * src - From where the value will be deserialized
///
/// # Returns
/// * `std::io::Result<()>` - Ok(()) on success, or an error if deserialization fails.
pub fn deserialize<T>(src: &mut impl Read) -> std::io::Result<T>
where
    T: Deserialize + Default,
{
    let mut val = T::default();
    val.deserialize(src)?;

    Ok(val)
}

/// Serializes a value into a fresh buffer.
pub fn to_bytes<T: Serialize + ?Sized>(value: &T) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    value.serialize(&mut buf)?;
    Ok(buf)
}

/// XDR `bool` type serialization implementation.
///
/// ```text
/// bool identifier;
/// ```
///
/// This is equivalent to:
///
/// ```text
///  enum { FALSE = 0, TRUE = 1 } identifier;
/// ```
///
/// Thus, the `bool` type is serialized as an `enum`, i.e. in `i32`.
impl Serialize for bool {
    fn serialize<R: Write>(&self, dest: &mut R) -> std::io::Result<()> {
        dest.write_i32::<XDREndian>(if *self { 1 } else { 0 })
    }
}

/// XDR `bool` type deserialization implementation.
///
/// Any value other than 0 or 1 is rejected.
impl Deserialize for bool {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match src.read_i32::<XDREndian>()? {
            0 => *self = false,
            1 => *self = true,
            other => return Err(unknown_discriminant("bool", other)),
        }
        Ok(())
    }
}

/// XDR `void` encodes to nothing.
impl Serialize for () {
    fn serialize<W: Write>(&self, _dest: &mut W) -> std::io::Result<()> {
        Ok(())
    }
}

impl Deserialize for () {
    fn deserialize<R: Read>(&mut self, _src: &mut R) -> std::io::Result<()> {
        Ok(())
    }
}

/// XDR `int` type serialization implementation.
impl Serialize for i32 {
    fn serialize<R: Write>(&self, dest: &mut R) -> std::io::Result<()> {
        dest.write_i32::<XDREndian>(*self)
    }
}

/// XDR `int` type deserialization implementation.
impl Deserialize for i32 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_i32::<XDREndian>()?;
        Ok(())
    }
}

/// XDR `hyper` type serialization implementation.
impl Serialize for i64 {
    fn serialize<R: Write>(&self, dest: &mut R) -> std::io::Result<()> {
        dest.write_i64::<XDREndian>(*self)
    }
}

/// XDR `hyper` type deserialization implementation.
impl Deserialize for i64 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_i64::<XDREndian>()?;
        Ok(())
    }
}

/// XDR `unsigned int` type serialization implementation.
impl Serialize for u32 {
    fn serialize<R: Write>(&self, dest: &mut R) -> std::io::Result<()> {
        dest.write_u32::<XDREndian>(*self)
    }
}

/// XDR `unsigned int` type deserialization implementation.
impl Deserialize for u32 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_u32::<XDREndian>()?;
        Ok(())
    }
}

/// XDR `unsigned hyper` type serialization implementation.
impl Serialize for u64 {
    fn serialize<R: Write>(&self, dest: &mut R) -> std::io::Result<()> {
        dest.write_u64::<XDREndian>(*self)
    }
}

/// XDR `unsigned hyper` type deserialization implementation.
impl Deserialize for u64 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_u64::<XDREndian>()?;
        Ok(())
    }
}

/// XDR `float` type serialization implementation.
impl Serialize for f32 {
    fn serialize<R: Write>(&self, dest: &mut R) -> std::io::Result<()> {
        dest.write_f32::<XDREndian>(*self)
    }
}

/// XDR `float` type deserialization implementation.
impl Deserialize for f32 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_f32::<XDREndian>()?;
        Ok(())
    }
}

/// XDR `double` type serialization implementation.
impl Serialize for f64 {
    fn serialize<R: Write>(&self, dest: &mut R) -> std::io::Result<()> {
        dest.write_f64::<XDREndian>(*self)
    }
}

/// XDR `double` type deserialization implementation.
impl Deserialize for f64 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_f64::<XDREndian>()?;
        Ok(())
    }
}

/// XDR Fixed-Length Opaque Data serialization implementation.
///
/// ```text
/// opaque identifier[n];
/// ```
impl<const N: usize> Serialize for [u8; N] {
    fn serialize<R: Write>(&self, dest: &mut R) -> std::io::Result<()> {
        dest.write_all(self)?;
        utils::write_padding(N, dest)?;

        Ok(())
    }
}

/// XDR Fixed-Length Opaque Data deserialization implementation.
///
/// ```text
/// opaque identifier[n];
/// ```
impl<const N: usize> Deserialize for [u8; N] {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        src.read_exact(self)?;
        utils::read_padding(N, src)?;

        Ok(())
    }
}

/// Object lengths in XDR are always serialized as [u32]. This wrapper
/// type provides a way to serialize the [usize] type common to Rust as [u32].
#[derive(Default)]
struct UsizeAsU32(usize);

/// Try to convert [usize] to [u32] and serialize.
impl Serialize for UsizeAsU32 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        let Some(val) = self.0.to_u32() else {
            return Err(utils::invalid_data("cannot cast `usize` to `u32`"));
        };

        val.serialize(dest)
    }
}

/// Try to deserialize [u32] and convert to [usize].
impl Deserialize for UsizeAsU32 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let Some(val) = deserialize::<u32>(src)?.to_usize() else {
            return Err(utils::invalid_data("cannot cast `u32` to `usize`"));
        };

        self.0 = val;
        Ok(())
    }
}

/// XDR Variable-Length Opaque Data serialization implementation.
///
/// ```text
/// opaque identifier<m>;
/// ```
impl Serialize for [u8] {
    fn serialize<R: Write>(&self, dest: &mut R) -> std::io::Result<()> {
        UsizeAsU32(self.len()).serialize(dest)?;
        dest.write_all(self)?;
        utils::write_padding(self.len(), dest)?;

        Ok(())
    }
}

/// Owned opaque data, needed where a generic bound asks for `Vec<u8>` itself
/// (for example the group names in a `List`).
impl Serialize for Vec<u8> {
    fn serialize<R: Write>(&self, dest: &mut R) -> std::io::Result<()> {
        self.as_slice().serialize(dest)
    }
}

/// XDR Variable-Length Opaque Data deserialization implementation.
impl Deserialize for Vec<u8> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let length = deserialize::<UsizeAsU32>(src)?.0;
        utils::read_bounded(length, src, self)?;
        utils::read_padding(length, src)?;

        Ok(())
    }
}

/// XDR String serialization implementation.
impl Serialize for str {
    fn serialize<R: Write>(&self, dest: &mut R) -> std::io::Result<()> {
        self.as_bytes().serialize(dest)
    }
}

/// XDR String deserialization implementation.
///
/// XDR itself only promises ASCII; UTF-8 is accepted since servers
/// commonly hand out UTF-8 path names. Anything else is rejected.
impl Deserialize for String {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let bytes = deserialize::<Vec<u8>>(src)?;
        match String::from_utf8(bytes) {
            Ok(s) => {
                *self = s;
                Ok(())
            }
            Err(_) => {
                self.clear();
                Err(utils::invalid_data("string is not valid UTF-8"))
            }
        }
    }
}

/// XDR Variable-Length Array serialization implementation.
///
/// Serialized as a 4-byte length prefix followed by that many elements.
impl<T: Serialize> Serialize for [T] {
    fn serialize<R: Write>(&self, dest: &mut R) -> std::io::Result<()> {
        UsizeAsU32(self.len()).serialize(dest)?;
        for i in self {
            i.serialize(dest)?;
        }

        Ok(())
    }
}

/// XDR Variable-Length Array deserialization implementation.
impl<T: Deserialize + Default> Deserialize for Vec<T> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let length = deserialize::<UsizeAsU32>(src)?.0;
        self.clear();
        self.reserve(length.min(MAX_PREALLOCATED_ELEMENTS));
        for _ in 0..length {
            self.push(deserialize::<T>(src)?);
        }
        Ok(())
    }
}

/// A list encoded the way XDR encodes `struct node { T item; node *next; }`:
/// every element is preceded by a TRUE "value follows" flag and the list ends
/// with FALSE. Decoding walks the chain iteratively, so a long server reply
/// cannot exhaust the stack.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct List<T>(pub Vec<T>);

impl<T: Serialize> Serialize for List<T> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        for item in &self.0 {
            true.serialize(dest)?;
            item.serialize(dest)?;
        }
        false.serialize(dest)
    }
}

impl<T: Deserialize + Default> Deserialize for List<T> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.0.clear();
        while deserialize::<bool>(src)? {
            self.0.push(deserialize::<T>(src)?);
        }
        Ok(())
    }
}

/// Macro for implementing XDR serialization and deserialization for structs.
///
/// This macro simplifies implementation of the XDR trait for struct types
/// by serializing or deserializing each field in sequence.
#[allow(non_camel_case_types)]
#[macro_export]
macro_rules! SerializeStruct {
    (
        $t:ident,
        $($element:ident),*
    ) => {
        impl $crate::xdr::Serialize for $t {
            fn serialize<R: std::io::Write>(&self, dest: &mut R) -> std::io::Result<()> {
                $(self.$element.serialize(dest)?;)*
                Ok(())
            }
        }
    };
}

#[allow(non_camel_case_types)]
#[macro_export]
macro_rules! DeserializeStruct {
    (
        $t:ident,
        $($element:ident),*
    ) => {
        impl $crate::xdr::Deserialize for $t {
            fn deserialize<R: std::io::Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                $(self.$element.deserialize(src)?;)*
                Ok(())
            }
        }
    };
}

/// Enumerations have the same representation as signed integers.
#[allow(non_camel_case_types)]
#[macro_export]
macro_rules! SerializeEnum {
    ($t:ident) => {
        impl $crate::xdr::Serialize for $t {
            fn serialize<R: std::io::Write>(&self, dest: &mut R) -> std::io::Result<()> {
                match num_traits::ToPrimitive::to_i32(self) {
                    Some(val) => $crate::xdr::Serialize::serialize(&val, dest),
                    None => Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        concat!("Invalid enum value for ", stringify!($t)),
                    )),
                }
            }
        }
    };
}

/// Unknown enum values are rejected rather than mapped to a default.
#[allow(non_camel_case_types)]
#[macro_export]
macro_rules! DeserializeEnum {
    ($t:ident) => {
        impl $crate::xdr::Deserialize for $t {
            fn deserialize<R: std::io::Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                let raw = $crate::xdr::deserialize::<i32>(src)?;
                match num_traits::FromPrimitive::from_i32(raw) {
                    Some(val) => {
                        *self = val;
                        Ok(())
                    }
                    None => Err($crate::xdr::unknown_discriminant(stringify!($t), raw)),
                }
            }
        }
    };
}

// XDR Optional-Data serialization implementation.
impl<T: Serialize> Serialize for Option<T> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            Some(data) => {
                true.serialize(dest)?;
                data.serialize(dest)?;

                Ok(())
            }
            None => false.serialize(dest),
        }
    }
}

// XDR Optional-Data deserialization implementation.
impl<T: Deserialize + Default> Deserialize for Option<T> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        if deserialize::<bool>(src)? {
            *self = Some(deserialize::<T>(src)?);
        } else {
            *self = None;
        }

        Ok(())
    }
}

// Re-export public types for use in other modules
pub use crate::DeserializeEnum;
pub use crate::DeserializeStruct;
pub use crate::SerializeEnum;
pub use crate::SerializeStruct;
