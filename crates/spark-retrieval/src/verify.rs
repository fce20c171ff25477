//! Content-addressed validation of retrieved data
//!
//! Every block is hashed with the function named by its CID. The requested CID
//! must then be present, or, failing that, some block must link only to blocks
//! that are present (one level of the DAG).

use std::collections::HashMap;

use bytes::Bytes;
use cid::Cid;
use sha2::{Digest, Sha256, Sha512};
use spark_error::{VerificationError, VerifyResult};
use spark_types::{Block, VerificationResult};
use tracing::debug;

use crate::car::CarReader;
use crate::dag::decode_links;

const IDENTITY: u64 = 0x00;
const SHA2_256: u64 = 0x12;
const SHA2_512: u64 = 0x13;
const BLAKE3: u64 = 0x1e;

/// How much of the DAG the response is expected to contain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationScope {
    /// Only the block of the requested CID
    Block,
    /// The requested CID and any blocks reachable from it
    Full,
}

/// Check that `bytes` hash to `cid`
pub fn validate_block(cid: &Cid, bytes: &[u8]) -> VerifyResult<()> {
    let hash = cid.hash();
    let computed: Vec<u8> = match hash.code() {
        IDENTITY => bytes.to_vec(),
        SHA2_256 => Sha256::digest(bytes).to_vec(),
        SHA2_512 => Sha512::digest(bytes).to_vec(),
        BLAKE3 => {
            let mut output = vec![0u8; hash.size() as usize];
            blake3::Hasher::new().update(bytes).finalize_xof().fill(&mut output);
            output
        }
        code => {
            return Err(VerificationError::UnsupportedHash {
                cid: cid.to_string(),
                code,
            })
        }
    };

    if computed.as_slice() != hash.digest() {
        return Err(VerificationError::HashMismatch {
            cid: cid.to_string(),
        });
    }
    Ok(())
}

/// Validate a CAR payload against the requested CID
pub fn verify_content(
    cid: &str,
    car_bytes: &[u8],
    scope: VerificationScope,
) -> VerifyResult<VerificationResult> {
    let reader = CarReader::new(car_bytes)?;

    let mut blocks: Vec<Block> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for section in reader {
        let (block_cid, data) = section?;
        validate_block(&block_cid, data)?;

        let key = block_cid.to_string();
        if scope == VerificationScope::Block && key != cid {
            return Err(VerificationError::UnexpectedBlock {
                cid: key,
                expected: cid.to_string(),
            });
        }
        if !index.contains_key(&key) {
            index.insert(key, blocks.len());
            blocks.push(Block::new(block_cid, Bytes::copy_from_slice(data)));
        }
    }

    let root = match index.get(cid) {
        Some(position) => &blocks[*position],
        None => {
            debug!(cid, found = blocks.len(), "Target CID not found directly, traversing DAG");
            find_complete_node(&blocks, &index).ok_or_else(|| VerificationError::IncompleteDag {
                cid: cid.to_string(),
            })?
        }
    };

    Ok(VerificationResult {
        valid: true,
        root_block: root.clone(),
        total_blocks: blocks.len(),
        total_size: blocks.iter().map(|block| block.len() as u64).sum(),
    })
}

/// First block with at least one link whose every link target is present
fn find_complete_node<'a>(blocks: &'a [Block], index: &HashMap<String, usize>) -> Option<&'a Block> {
    blocks.iter().find(|block| match decode_links(&block.cid, &block.bytes) {
        Ok(Some(links)) => {
            !links.is_empty() && links.iter().all(|link| index.contains_key(&link.to_string()))
        }
        Ok(None) => false,
        Err(err) => {
            debug!(cid = %block.cid, error = %err, "Failed to decode block");
            false
        }
    })
}

/// Validate a response that carries the raw bytes of a single block
pub fn verify_raw_block(cid: &str, bytes: &[u8]) -> VerifyResult<VerificationResult> {
    let parsed = Cid::try_from(cid).map_err(|err| {
        VerificationError::CannotParseCar(format!("invalid CID {}: {}", cid, err))
    })?;
    validate_block(&parsed, bytes)?;

    Ok(VerificationResult {
        valid: true,
        root_block: Block::new(parsed, Bytes::copy_from_slice(bytes)),
        total_blocks: 1,
        total_size: bytes.len() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use multihash::Multihash;

    fn cid_with(code: u64, digest: &[u8]) -> Cid {
        Cid::new_v1(0x55, Multihash::<64>::wrap(code, digest).unwrap())
    }

    #[test]
    fn test_supported_hashes() {
        let data = b"spark";
        validate_block(&cid_with(SHA2_256, &Sha256::digest(data)), data).unwrap();
        validate_block(&cid_with(SHA2_512, &Sha512::digest(data)), data).unwrap();
        validate_block(&cid_with(BLAKE3, blake3::hash(data).as_bytes()), data).unwrap();
        validate_block(&cid_with(IDENTITY, data), data).unwrap();
    }

    #[test]
    fn test_hash_mismatch() {
        let cid = cid_with(SHA2_256, &Sha256::digest(b"expected"));
        assert_eq!(
            validate_block(&cid, b"actual"),
            Err(VerificationError::HashMismatch {
                cid: cid.to_string()
            })
        );
    }

    #[test]
    fn test_unsupported_hash() {
        // keccak-256
        let cid = cid_with(0x1b, &[0u8; 32]);
        assert!(matches!(
            validate_block(&cid, b"data"),
            Err(VerificationError::UnsupportedHash { code: 0x1b, .. })
        ));
    }

    #[test]
    fn test_raw_block() {
        let cid = cid_with(SHA2_256, &Sha256::digest(b"raw")).to_string();
        let result = verify_raw_block(&cid, b"raw").unwrap();
        assert_eq!(result.total_blocks, 1);
        assert_eq!(result.total_size, 3);
        assert_eq!(result.root_block.cid.to_string(), cid);
        assert_eq!(result.root_block.bytes.as_ref(), b"raw");

        assert!(matches!(
            verify_raw_block(&cid, b"other"),
            Err(VerificationError::HashMismatch { .. })
        ));
    }
}
