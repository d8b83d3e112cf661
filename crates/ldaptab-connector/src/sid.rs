//! Binary security identifier (SID) decoding.
//!
//! Layout of an encoded SID:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 1 | revision level |
//! | 1 | 1 | sub-authority count `N` |
//! | 2 | 6 | identifier authority, big-endian |
//! | 8 | 4·N | sub-authorities, each little-endian |

use tracing::warn;

use crate::error::{ConnectorError, ConnectorResult};

const HEADER_LEN: usize = 8;
const SUB_AUTHORITY_LEN: usize = 4;

/// A decoded security identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sid {
    /// Revision level.
    pub revision: u8,
    /// 48-bit identifier authority.
    pub authority: u64,
    /// Sub-authorities in encoded order.
    pub sub_authorities: Vec<u32>,
}

impl Sid {
    /// Decode a SID from its binary form.
    ///
    /// Fails when the buffer is shorter than the header or ends inside a
    /// sub-authority. A count byte larger than the number of complete
    /// sub-authorities present is clamped to what the buffer holds.
    pub fn from_bytes(bytes: &[u8]) -> ConnectorResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(ConnectorError::InvalidSid {
                message: format!(
                    "buffer of {} bytes is shorter than the {HEADER_LEN}-byte header",
                    bytes.len()
                ),
            });
        }

        let revision = bytes[0];
        let announced = usize::from(bytes[1]);
        let expected = HEADER_LEN + announced * SUB_AUTHORITY_LEN;
        let count = if bytes.len() >= expected {
            announced
        } else {
            let trailing = bytes.len() - HEADER_LEN;
            if trailing % SUB_AUTHORITY_LEN != 0 {
                return Err(ConnectorError::InvalidSid {
                    message: format!(
                        "header announces {announced} sub-authorities but buffer ends inside one ({} bytes)",
                        bytes.len()
                    ),
                });
            }
            let present = trailing / SUB_AUTHORITY_LEN;
            warn!(
                announced = announced,
                present = present,
                "SID header announces more sub-authorities than present"
            );
            present
        };
        let end = HEADER_LEN + count * SUB_AUTHORITY_LEN;

        let authority = bytes[2..HEADER_LEN]
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));

        let sub_authorities = bytes[HEADER_LEN..end]
            .chunks_exact(SUB_AUTHORITY_LEN)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(Self {
            revision,
            authority,
            sub_authorities,
        })
    }

    /// The relative identifier (final sub-authority), if any.
    pub fn last_sub_authority(&self) -> Option<u32> {
        self.sub_authorities.last().copied()
    }
}

impl std::fmt::Display for Sid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S-{}-{}", self.revision, self.authority)?;
        for sub in &self.sub_authorities {
            write!(f, "-{sub}")?;
        }
        Ok(())
    }
}

/// Decode a binary SID into its canonical `S-R-A-S1-…-SN` text.
pub fn decode_sid(bytes: &[u8]) -> ConnectorResult<String> {
    Sid::from_bytes(bytes).map(|sid| sid.to_string())
}
