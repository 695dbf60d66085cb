//! OSC 1.0 wire format: encoding by hand, decoding with `nom`.

use nom::bytes::complete::{tag, take, take_until};
use nom::error::{ErrorKind, ParseError};
use nom::number::complete::{be_f32, be_i32, be_i64, be_u64};
use nom::Err as NomErr;
use std::fmt;

use crate::error::ProtocolError;

const BUNDLE_TAG: &[u8] = b"#bundle\0";

/// Bundles nested deeper than this are refused
pub const MAX_BUNDLE_DEPTH: usize = 8;

/// A single typed OSC argument
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    Str(String),
    Long(i64),
    Blob(Vec<u8>),
}

impl OscArg {
    pub fn type_tag(&self) -> char {
        match self {
            OscArg::Int(_) => 'i',
            OscArg::Float(_) => 'f',
            OscArg::Str(_) => 's',
            OscArg::Long(_) => 'h',
            OscArg::Blob(_) => 'b',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: OscArg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn with_args(address: impl Into<String>, args: Vec<OscArg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }

    /// Type tags of the arguments, e.g. `"isf"`
    pub fn type_tags(&self) -> String {
        self.args.iter().map(OscArg::type_tag).collect()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        write_string(&mut out, &self.address);
        write_string(&mut out, &format!(",{}", self.type_tags()));

        for arg in &self.args {
            match arg {
                OscArg::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
                OscArg::Float(v) => out.extend_from_slice(&v.to_be_bytes()),
                OscArg::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
                OscArg::Str(s) => write_string(&mut out, s),
                OscArg::Blob(bytes) => {
                    out.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
                    out.extend_from_slice(bytes);
                    out.resize(out.len() + (4 - bytes.len() % 4) % 4, 0);
                }
            }
        }
        out
    }
}

impl fmt::Display for OscMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)?;
        for arg in &self.args {
            match arg {
                OscArg::Int(v) => write!(f, " {}", v)?,
                OscArg::Float(v) => write!(f, " {}", v)?,
                OscArg::Long(v) => write!(f, " {}", v)?,
                OscArg::Str(s) => write!(f, " \"{}\"", s)?,
                OscArg::Blob(b) => write!(f, " <{} bytes>", b.len())?,
            }
        }
        Ok(())
    }
}

/// Null-terminated, padded to a multiple of four bytes
fn write_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.resize(out.len() + 4 - s.len() % 4, 0);
}

/// Decode one UDP datagram into the messages it carries (bundles are flattened)
pub fn decode_packet(packet: &[u8]) -> Result<Vec<OscMessage>, ProtocolError> {
    let mut messages = Vec::new();
    match packet_contents(packet, 0, &mut messages) {
        Ok(_) => Ok(messages),
        Err(NomErr::Error(DecodeError::Protocol(e)) | NomErr::Failure(DecodeError::Protocol(e))) => {
            Err(e)
        }
        Err(_) => Err(ProtocolError::Truncated),
    }
}

#[derive(Debug, PartialEq)]
enum DecodeError {
    Nom,
    Protocol(ProtocolError),
}

impl<I> ParseError<I> for DecodeError {
    fn from_error_kind(_input: I, _kind: ErrorKind) -> Self {
        DecodeError::Nom
    }

    fn append(_input: I, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type IResult<'a, O> = nom::IResult<&'a [u8], O, DecodeError>;

fn fail<O>(error: ProtocolError) -> IResult<'static, O> {
    Err(NomErr::Failure(DecodeError::Protocol(error)))
}

fn osc_string(input: &[u8]) -> IResult<'_, String> {
    let (rest, raw) = take_until::<_, _, DecodeError>(&b"\0"[..])(input)?;
    let (rest, _) = take::<_, _, DecodeError>(4 - raw.len() % 4)(rest)?;
    match std::str::from_utf8(raw) {
        Ok(s) => Ok((rest, s.to_string())),
        Err(_) => fail(ProtocolError::InvalidUtf8),
    }
}

fn osc_blob(input: &[u8]) -> IResult<'_, Vec<u8>> {
    let (rest, len) = be_i32::<_, DecodeError>(input)?;
    if len < 0 {
        return fail(ProtocolError::Truncated);
    }
    let len = len as usize;
    let (rest, bytes) = take::<_, _, DecodeError>(len)(rest)?;
    let (rest, _) = take::<_, _, DecodeError>((4 - len % 4) % 4)(rest)?;
    Ok((rest, bytes.to_vec()))
}

fn osc_arg(tag: char, input: &[u8]) -> IResult<'_, OscArg> {
    match tag {
        'i' => be_i32(input).map(|(r, v)| (r, OscArg::Int(v))),
        'f' => be_f32(input).map(|(r, v)| (r, OscArg::Float(v))),
        'h' => be_i64(input).map(|(r, v)| (r, OscArg::Long(v))),
        's' => osc_string(input).map(|(r, v)| (r, OscArg::Str(v))),
        'b' => osc_blob(input).map(|(r, v)| (r, OscArg::Blob(v))),
        other => fail(ProtocolError::UnsupportedTag(other)),
    }
}

fn message(input: &[u8]) -> IResult<'_, OscMessage> {
    let (mut rest, address) = osc_string(input)?;
    if !address.starts_with('/') {
        return fail(ProtocolError::NotOsc);
    }

    let mut args = Vec::new();
    if !rest.is_empty() {
        let (after_tags, tags) = osc_string(rest)?;
        let Some(tags) = tags.strip_prefix(',') else {
            return fail(ProtocolError::NotOsc);
        };
        rest = after_tags;
        for tag in tags.chars() {
            let (next, arg) = osc_arg(tag, rest)?;
            args.push(arg);
            rest = next;
        }
    }

    Ok((rest, OscMessage { address, args }))
}

fn bundle<'a>(input: &'a [u8], depth: usize, out: &mut Vec<OscMessage>) -> IResult<'a, ()> {
    if depth >= MAX_BUNDLE_DEPTH {
        return fail(ProtocolError::TooDeep(MAX_BUNDLE_DEPTH));
    }
    let (mut rest, _) = tag::<_, _, DecodeError>(BUNDLE_TAG)(input)?;
    let (next, _timetag) = be_u64::<_, DecodeError>(rest)?;
    rest = next;

    while !rest.is_empty() {
        let (next, size) = be_i32::<_, DecodeError>(rest)?;
        if size < 0 {
            return fail(ProtocolError::Truncated);
        }
        let (next, element) = take::<_, _, DecodeError>(size as usize)(next)?;
        packet_contents(element, depth + 1, out)?;
        rest = next;
    }
    Ok((rest, ()))
}

fn packet_contents<'a>(
    input: &'a [u8],
    depth: usize,
    out: &mut Vec<OscMessage>,
) -> IResult<'a, ()> {
    match input.first() {
        Some(b'#') => bundle(input, depth, out),
        Some(b'/') => {
            let (rest, msg) = message(input)?;
            out.push(msg);
            Ok((rest, ()))
        }
        Some(_) => fail(ProtocolError::NotOsc),
        None => fail(ProtocolError::Truncated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_padding() {
        let msg = OscMessage::new("/abc");
        let bytes = msg.encode();
        // "/abc" + 4 nulls, "," + 3 nulls
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[..8], b"/abc\0\0\0\0");
        assert_eq!(&bytes[8..], b",\0\0\0");
    }

    #[test]
    fn test_decode_typed_message() {
        let msg = OscMessage::new("/video/position")
            .arg(OscArg::Int(2))
            .arg(OscArg::Float(1.5))
            .arg(OscArg::Str("left".into()))
            .arg(OscArg::Long(-7))
            .arg(OscArg::Blob(vec![1, 2, 3]));

        let decoded = decode_packet(&msg.encode()).unwrap();
        assert_eq!(decoded, vec![msg]);
    }

    #[test]
    fn test_bundle_is_flattened() {
        let a = OscMessage::new("/reset_orientation");
        let b = OscMessage::new("/video/stop").arg(OscArg::Int(1));

        let mut packet = BUNDLE_TAG.to_vec();
        packet.extend_from_slice(&1u64.to_be_bytes());
        for m in [&a, &b] {
            let bytes = m.encode();
            packet.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
            packet.extend_from_slice(&bytes);
        }

        assert_eq!(decode_packet(&packet).unwrap(), vec![a, b]);
    }

    fn wrap_in_bundle(element: &[u8]) -> Vec<u8> {
        let mut packet = BUNDLE_TAG.to_vec();
        packet.extend_from_slice(&1u64.to_be_bytes());
        packet.extend_from_slice(&(element.len() as i32).to_be_bytes());
        packet.extend_from_slice(element);
        packet
    }

    #[test]
    fn test_nested_bundles_are_capped() {
        let inner = OscMessage::new("/reset_orientation");

        let mut packet = inner.encode();
        for _ in 0..MAX_BUNDLE_DEPTH {
            packet = wrap_in_bundle(&packet);
        }
        assert_eq!(decode_packet(&packet).unwrap(), vec![inner.clone()]);

        packet = wrap_in_bundle(&packet);
        assert_eq!(
            decode_packet(&packet),
            Err(ProtocolError::TooDeep(MAX_BUNDLE_DEPTH))
        );

        // A datagram-sized tower of bundles is refused without recursing through it
        let mut tower = inner.encode();
        while tower.len() < 60_000 {
            tower = wrap_in_bundle(&tower);
        }
        assert_eq!(
            decode_packet(&tower),
            Err(ProtocolError::TooDeep(MAX_BUNDLE_DEPTH))
        );
    }

    #[test]
    fn test_malformed_packets() {
        assert_eq!(decode_packet(b""), Err(ProtocolError::Truncated));
        assert_eq!(decode_packet(b"hello\0\0\0"), Err(ProtocolError::NotOsc));

        let mut truncated = OscMessage::new("/video/stop").arg(OscArg::Int(1)).encode();
        truncated.truncate(truncated.len() - 2);
        assert_eq!(decode_packet(&truncated), Err(ProtocolError::Truncated));

        let mut bad_tag = Vec::new();
        write_string(&mut bad_tag, "/x");
        write_string(&mut bad_tag, ",T");
        assert_eq!(decode_packet(&bad_tag), Err(ProtocolError::UnsupportedTag('T')));
    }
}
