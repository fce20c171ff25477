//! CAR container decoding
//!
//! A CARv1 stream is a varint-prefixed dag-cbor header followed by sections of
//! `varint(len) | CID | block bytes`. CARv2 wraps a CARv1 payload behind a fixed
//! pragma and a 40 byte header carrying the payload offset and size.

use std::collections::BTreeMap;
use std::io::Cursor;

use cid::Cid;
use ipld_core::ipld::Ipld;
use spark_error::{VerificationError, VerifyResult};

/// `varint(10) | {"version": 2}` in dag-cbor
const CARV2_PRAGMA: [u8; 11] = [
    0x0a, 0xa1, 0x67, 0x76, 0x65, 0x72, 0x73, 0x69, 0x6f, 0x6e, 0x02,
];
const CARV2_HEADER_LEN: usize = 40;

/// Decoded CARv1 header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarHeader {
    pub version: u64,
    pub roots: Vec<Cid>,
}

/// Iterator over the `(CID, bytes)` sections of a CAR payload.
///
/// Blocks are not validated here.
#[derive(Debug)]
pub struct CarReader<'a> {
    header: CarHeader,
    data: &'a [u8],
    failed: bool,
}

impl<'a> CarReader<'a> {
    /// Parse the header of a CARv1 or CARv2 payload
    pub fn new(bytes: &'a [u8]) -> VerifyResult<Self> {
        let payload = if bytes.starts_with(&CARV2_PRAGMA) {
            carv2_payload(bytes)?
        } else {
            bytes
        };

        let (header_bytes, data) = read_section(payload)?
            .ok_or_else(|| parse_error("missing CAR header"))?;
        let header = decode_header(header_bytes)?;
        if header.version != 1 {
            return Err(parse_error(format!(
                "unsupported CAR version {}",
                header.version
            )));
        }

        Ok(Self {
            header,
            data,
            failed: false,
        })
    }

    pub fn header(&self) -> &CarHeader {
        &self.header
    }

    fn next_block(&mut self) -> VerifyResult<Option<(Cid, &'a [u8])>> {
        let Some((section, rest)) = read_section(self.data)? else {
            return Ok(None);
        };
        self.data = rest;

        let mut cursor = Cursor::new(section);
        let cid = Cid::read_bytes(&mut cursor)
            .map_err(|err| parse_error(format!("invalid block CID: {}", err)))?;
        let offset = cursor.position() as usize;
        Ok(Some((cid, &section[offset..])))
    }
}

impl<'a> Iterator for CarReader<'a> {
    type Item = VerifyResult<(Cid, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_block() {
            Ok(block) => block.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

fn parse_error(message: impl Into<String>) -> VerificationError {
    VerificationError::CannotParseCar(message.into())
}

/// Read one varint-prefixed section. `None` at the end of the data or at
/// zero padding.
fn read_section(data: &[u8]) -> VerifyResult<Option<(&[u8], &[u8])>> {
    if data.is_empty() {
        return Ok(None);
    }

    let (length, rest) = unsigned_varint::decode::u64(data)
        .map_err(|err| parse_error(format!("invalid section length: {}", err)))?;
    if length == 0 {
        return Ok(None);
    }

    let length = usize::try_from(length)
        .ok()
        .filter(|length| *length <= rest.len())
        .ok_or_else(|| {
            parse_error(format!(
                "section of {} bytes exceeds the remaining {} bytes",
                length,
                rest.len()
            ))
        })?;
    Ok(Some(rest.split_at(length)))
}

fn decode_header(bytes: &[u8]) -> VerifyResult<CarHeader> {
    let header: Ipld = serde_ipld_dagcbor::from_slice(bytes)
        .map_err(|err| parse_error(format!("invalid CAR header: {}", err)))?;
    let Ipld::Map(map) = header else {
        return Err(parse_error("CAR header is not a map"));
    };

    let version = match map.get("version") {
        Some(Ipld::Integer(version)) => u64::try_from(*version)
            .map_err(|_| parse_error(format!("invalid CAR version {}", version)))?,
        _ => return Err(parse_error("CAR header has no version")),
    };

    Ok(CarHeader {
        version,
        roots: header_roots(&map)?,
    })
}

fn header_roots(map: &BTreeMap<String, Ipld>) -> VerifyResult<Vec<Cid>> {
    match map.get("roots") {
        None => Ok(Vec::new()),
        Some(Ipld::List(roots)) => roots
            .iter()
            .map(|root| match root {
                Ipld::Link(cid) => Ok(*cid),
                _ => Err(parse_error("CAR root is not a CID")),
            })
            .collect(),
        Some(_) => Err(parse_error("CAR roots is not a list")),
    }
}

fn carv2_payload(bytes: &[u8]) -> VerifyResult<&[u8]> {
    let header = bytes
        .get(CARV2_PRAGMA.len()..CARV2_PRAGMA.len() + CARV2_HEADER_LEN)
        .ok_or_else(|| parse_error("truncated CARv2 header"))?;

    // 16 bytes of characteristics, then little-endian data offset and size
    let read_u64 = |at: usize| {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&header[at..at + 8]);
        u64::from_le_bytes(buf)
    };
    let offset = read_u64(16);
    let size = read_u64(24);

    let start = usize::try_from(offset).ok();
    let end = offset.checked_add(size).and_then(|end| usize::try_from(end).ok());
    match (start, end) {
        (Some(start), Some(end)) if end <= bytes.len() => Ok(&bytes[start..end]),
        _ => Err(parse_error(format!(
            "CARv2 data range {}+{} is outside of the {} byte payload",
            offset,
            size,
            bytes.len()
        ))),
    }
}
