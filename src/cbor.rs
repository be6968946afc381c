use nom::{
    bytes::complete::take,
    error::{ErrorKind, ParseError},
    number::complete::{be_u16, be_u32, be_u64, be_u8},
    IResult,
};

use crate::DecodeError;

/// A decoded CBOR item, limited to the item kinds the HCERT format emits:
/// integers, definite-length byte/text strings, arrays, maps and tags.
/// Floats, simple values and indefinite-length items are rejected.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Integer(i64),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Tag(u64, Box<Value>),
}

impl Value {
    pub(crate) fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub(crate) fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub(crate) fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(t) => Some(t),
            _ => None,
        }
    }

    pub(crate) fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub(crate) fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

/// Looks up a map entry by integer key. A text key holding the decimal
/// rendering of the integer matches as well; producers that re-encode the
/// CWT claim map through JSON emit `"1"` where the CWT has `1`.
pub(crate) fn map_get(entries: &[(Value, Value)], key: i64) -> Option<&Value> {
    entries.iter().find_map(|(k, v)| match k {
        Value::Integer(i) if *i == key => Some(v),
        Value::Text(t) if *t == key.to_string() => Some(v),
        _ => None,
    })
}

pub(crate) fn map_get_text<'m>(entries: &'m [(Value, Value)], key: &str) -> Option<&'m Value> {
    entries
        .iter()
        .find_map(|(k, v)| (k.as_text() == Some(key)).then_some(v))
}

#[derive(Debug, PartialEq)]
pub(crate) enum CborError<I> {
    Unsupported(String),
    IntegerError(String),
    StringError(String),
    Nom(I, ErrorKind),
}

impl<I> ParseError<I> for CborError<I> {
    fn from_error_kind(input: I, kind: ErrorKind) -> Self {
        CborError::Nom(input, kind)
    }

    fn append(_: I, _: ErrorKind, other: Self) -> Self {
        other
    }
}

type In<'i> = &'i [u8];
type CborResult<'i, T> = IResult<In<'i>, T, CborError<In<'i>>>;

/// Reads the initial byte and length/value argument of a data item.
/// Additional-information values 28..=31 (reserved and indefinite-length
/// markers) are not produced by HCERT encoders and are rejected.
fn item_head(input: In) -> CborResult<(u8, u64)> {
    let (input, initial) = be_u8(input)?;
    let major = initial >> 5;
    let (input, argument) = match initial & 0x1f {
        n @ 0..=23 => (input, u64::from(n)),
        24 => {
            let (input, v) = be_u8(input)?;
            (input, u64::from(v))
        }
        25 => {
            let (input, v) = be_u16(input)?;
            (input, u64::from(v))
        }
        26 => {
            let (input, v) = be_u32(input)?;
            (input, u64::from(v))
        }
        27 => be_u64(input)?,
        info => {
            return Err(nom::Err::Failure(CborError::Unsupported(format!(
                "unsupported additional information {info} in initial byte {initial:#04x}"
            ))))
        }
    };
    Ok((input, (major, argument)))
}

fn integer(argument: u64, negative: bool) -> Result<i64, String> {
    let magnitude = i64::try_from(argument)
        .map_err(|_| format!("integer argument {argument} exceeds the supported 64-bit range"))?;
    Ok(if negative { -1 - magnitude } else { magnitude })
}

fn sized(argument: u64) -> Result<usize, String> {
    usize::try_from(argument).map_err(|_| format!("length {argument} does not fit into usize"))
}

fn integer_error<'i>(message: String) -> nom::Err<CborError<In<'i>>> {
    nom::Err::Failure(CborError::IntegerError(message))
}

fn item(input: In) -> CborResult<Value> {
    let (input, (major, argument)) = item_head(input)?;
    match major {
        0 => Ok((
            input,
            Value::Integer(integer(argument, false).map_err(integer_error)?),
        )),
        1 => Ok((
            input,
            Value::Integer(integer(argument, true).map_err(integer_error)?),
        )),
        2 => {
            let (input, bytes) = take(sized(argument).map_err(integer_error)?)(input)?;
            Ok((input, Value::Bytes(bytes.to_vec())))
        }
        3 => {
            let (input, bytes) = take(sized(argument).map_err(integer_error)?)(input)?;
            let text = core::str::from_utf8(bytes).map_err(|e| {
                nom::Err::Failure(CborError::StringError(format!(
                    "text string is not valid UTF-8: {e}"
                )))
            })?;
            Ok((input, Value::Text(text.to_string())))
        }
        4 => {
            let mut items = Vec::new();
            let mut rest = input;
            for _ in 0..argument {
                let (remaining, value) = item(rest)?;
                items.push(value);
                rest = remaining;
            }
            Ok((rest, Value::Array(items)))
        }
        5 => {
            let mut entries = Vec::new();
            let mut rest = input;
            for _ in 0..argument {
                let (remaining, key) = item(rest)?;
                let (remaining, value) = item(remaining)?;
                entries.push((key, value));
                rest = remaining;
            }
            Ok((rest, Value::Map(entries)))
        }
        6 => {
            let (input, inner) = item(input)?;
            Ok((input, Value::Tag(argument, Box::new(inner))))
        }
        other => Err(nom::Err::Failure(CborError::Unsupported(format!(
            "unsupported major type {other}"
        )))),
    }
}

/// Decodes a single top-level data item. Trailing bytes after the item are
/// ignored, matching decoders that read one item off a stream.
pub(crate) fn decode(input: &[u8]) -> Result<Value, DecodeError> {
    match item(input) {
        Ok((_, value)) => Ok(value),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            Err(DecodeError::MalformedBinaryObject(describe(e)))
        }
        Err(nom::Err::Incomplete(_)) => Err(DecodeError::MalformedBinaryObject(
            "unexpected end of input".into(),
        )),
    }
}

fn describe(error: CborError<In<'_>>) -> String {
    match error {
        CborError::Unsupported(s) | CborError::IntegerError(s) | CborError::StringError(s) => s,
        CborError::Nom(rest, ErrorKind::Eof) => {
            format!("premature end of input with {} bytes remaining", rest.len())
        }
        CborError::Nom(rest, kind) => {
            format!("parse error {kind:?} with {} bytes remaining", rest.len())
        }
    }
}

pub(crate) fn write_head(out: &mut Vec<u8>, major: u8, argument: u64) {
    let major = major << 5;
    match argument {
        0..=23 => out.push(major | argument as u8),
        24..=0xff => {
            out.push(major | 24);
            out.push(argument as u8);
        }
        0x100..=0xffff => {
            out.push(major | 25);
            out.extend_from_slice(&(argument as u16).to_be_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(major | 26);
            out.extend_from_slice(&(argument as u32).to_be_bytes());
        }
        _ => {
            out.push(major | 27);
            out.extend_from_slice(&argument.to_be_bytes());
        }
    }
}

pub(crate) fn write_array_head(out: &mut Vec<u8>, length: u64) {
    write_head(out, 4, length);
}

pub(crate) fn write_text(out: &mut Vec<u8>, text: &str) {
    write_head(out, 3, text.len() as u64);
    out.extend_from_slice(text.as_bytes());
}

pub(crate) fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_head(out, 2, bytes.len() as u64);
    out.extend_from_slice(bytes);
}
