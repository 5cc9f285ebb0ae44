use usync_common::{FileId, FolderUniqueId, SegmentIndex};
use usync_nntp::{ConnectionPool, NntpError};
use usync_share::ManifestSegment;

use crate::error::{DownloadError, Result};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// `ARTICLE`'s multiline response is headers, a blank line, then the
/// yEnc body; strip everything up to and including that blank line.
fn strip_headers(raw: &[u8]) -> &[u8] {
    raw.windows(2).position(|w| w == b"\n\n").map(|i| &raw[i + 2..]).unwrap_or(raw)
}

async fn fetch_raw_article(pool: &ConnectionPool, message_id: &str) -> Result<Vec<u8>> {
    let mut conn = pool.acquire().await?;
    match conn.article(message_id).await {
        Ok(raw) => Ok(raw),
        Err(err) => {
            if !matches!(err, NntpError::NoSuchArticle) {
                conn.discard();
            }
            Err(err.into())
        }
    }
}

/// Falls back to `XOVER` over the group when the `message_id` is gone,
/// matching overview lines by `Subject` and retrieving whichever
/// `message_id` the server currently associates with it.
/// XOVER overview lines are tab-separated: number, subject, from,
/// date, message-id, references, bytes, lines.
async fn fetch_by_subject(pool: &ConnectionPool, group: &str, usenet_subject: &str) -> Result<Vec<u8>> {
    let message_id = {
        let mut conn = pool.acquire().await?;
        let lines = conn.xover(group, "1-").await?;
        lines.iter().find_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            let subject_matches = fields.get(1).map(|s| *s == usenet_subject).unwrap_or(false);
            if subject_matches {
                fields.get(4).map(|s| s.to_string())
            } else {
                None
            }
        })
    };

    match message_id {
        Some(id) => fetch_raw_article(pool, &id).await,
        None => Err(DownloadError::Nntp(NntpError::NoSuchArticle)),
    }
}

/// Retrieves, yEnc-decodes, decrypts and verifies one segment's plaintext,
/// trying `message_id`, then subject search, then each
/// `redundancy_message_ids` entry in turn until one passes every check.
/// Returns [`DownloadError::Unrecoverable`] only after
/// every copy has been exhausted.
pub async fn fetch_segment_plaintext(
    pool: &ConnectionPool,
    group: &str,
    folder_unique_id: &FolderUniqueId,
    segment_key: &[u8; 32],
    file_id: FileId,
    segment: &ManifestSegment,
) -> Result<Vec<u8>> {
    enum Candidate<'a> {
        MessageId(&'a str),
        Subject,
    }

    let mut candidates = vec![Candidate::MessageId(segment.message_id.as_str()), Candidate::Subject];
    candidates.extend(segment.redundancy_message_ids.iter().map(|id| Candidate::MessageId(id.as_str())));

    for candidate in candidates {
        let raw = match candidate {
            Candidate::MessageId(id) => fetch_raw_article(pool, id).await,
            Candidate::Subject => fetch_by_subject(pool, group, &segment.usenet_subject).await,
        };
        let raw = match raw {
            Ok(raw) => raw,
            Err(err) => {
                tracing::debug!(file_id = ?file_id, segment_index = segment.segment_index, error = %err, "segment copy unavailable, trying next");
                continue;
            }
        };

        let ciphertext = match usync_nntp::yenc::decode(strip_headers(&raw)) {
            Ok(c) => c,
            Err(err) => {
                tracing::warn!(file_id = ?file_id, segment_index = segment.segment_index, error = %err, "yEnc decode failed, trying next copy");
                continue;
            }
        };

        let plaintext = match usync_crypto::decrypt_segment(
            segment_key,
            folder_unique_id,
            file_id,
            SegmentIndex(segment.segment_index),
            &ciphertext,
        ) {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(file_id = ?file_id, segment_index = segment.segment_index, error = %err, "decrypt failed, trying next copy");
                continue;
            }
        };

        if usync_crypto::sha256(&plaintext) != segment.plaintext_hash {
            tracing::warn!(file_id = ?file_id, segment_index = segment.segment_index, "plaintext_hash mismatch, trying next copy");
            continue;
        }

        return Ok(plaintext);
    }

    Err(DownloadError::Unrecoverable { file_id, segment_index: segment.segment_index })
}
