//! Wire codec.
//!
//! Length-prefixed, little-endian serialization of primitives, strings,
//! byte vectors and structures over a byte stream. Structures serialize
//! their members in declaration order and reading is strictly positional:
//! a layout mismatch is not recoverable and surfaces as an `io::Error`.
//!
//! Contract: `T::decode(&mut &encode_to_vec(x)[..]) == x` for every
//! supported `x`.

use std::io::{self, Read, Write};

pub trait Encode {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()>;
}

pub trait Decode: Sized {
    fn decode<R: Read>(r: &mut R) -> io::Result<Self>;
}

macro_rules! impl_wire_primitive {
    ($($ty:ty),*) => {
        $(
            impl Encode for $ty {
                fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
                    w.write_all(&self.to_le_bytes())
                }
            }

            impl Decode for $ty {
                fn decode<R: Read>(r: &mut R) -> io::Result<Self> {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    r.read_exact(&mut buf)?;
                    Ok(<$ty>::from_le_bytes(buf))
                }
            }
        )*
    };
}

impl_wire_primitive!(u8, u16, u32, u64, i16, i32, i64, f32, f64);

impl Encode for Vec<u8> {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        (self.len() as u32).encode(w)?;
        w.write_all(self)
    }
}

impl Decode for Vec<u8> {
    fn decode<R: Read>(r: &mut R) -> io::Result<Self> {
        let len = u32::decode(r)? as usize;
        let mut buf = vec![0u8; len];
        r.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl Encode for String {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        (self.len() as u32).encode(w)?;
        w.write_all(self.as_bytes())
    }
}

impl Decode for String {
    fn decode<R: Read>(r: &mut R) -> io::Result<Self> {
        let bytes = Vec::<u8>::decode(r)?;
        String::from_utf8(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// Serialize a value into a fresh byte vector.
pub fn encode_to_vec<T: Encode>(value: &T) -> Vec<u8> {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    value
        .encode(&mut buf)
        .expect("encoding into a Vec is infallible");
    buf
}
