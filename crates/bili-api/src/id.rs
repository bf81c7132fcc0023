//! Video identifiers.
//!
//! Bilibili addresses a video either by its numeric `av` id or by a twelve
//! character `BV` id. The two are interchangeable: the `BV` form is the `av`
//! number XOR-masked, written in a shuffled base-58 alphabet, with two pairs of
//! positions swapped.

use crate::ApiError;

const XOR_CODE: u64 = 23_442_827_791_579;
const MASK_CODE: u64 = 2_251_799_813_685_247;
const MAX_AID: u64 = 1 << 51;
const BASE: u64 = 58;
const ALPHABET: &[u8; 58] = b"FcwAPNKTMug3GV5Lj7EJnHpWsx4tb8haYeviqBz6rkCy12mUSDQX9RdoZf";

const BV_LEN: usize = 12;
const BV_PREFIX: &str = "BV1";

/// Return the `BV` id for a user supplied id.
///
/// `BV...` ids pass through untouched; `av<number>` (any case) is converted.
pub fn normalize_id(id: &str) -> Result<String, ApiError> {
    let id = id.trim();
    if id.starts_with("BV") {
        return Ok(id.to_string());
    }

    let digits = id
        .get(..2)
        .filter(|prefix| prefix.eq_ignore_ascii_case("av"))
        .map(|_| &id[2..])
        .ok_or_else(|| ApiError::InvalidId(id.to_string()))?;

    let aid = digits
        .parse::<u64>()
        .map_err(|_| ApiError::InvalidId(id.to_string()))?;
    av_to_bv(aid).ok_or_else(|| ApiError::InvalidId(id.to_string()))
}

/// Encode an `av` number. `None` for `0` and for numbers beyond the id space.
pub fn av_to_bv(aid: u64) -> Option<String> {
    if aid == 0 || aid >= MAX_AID {
        return None;
    }

    let mut bytes = *b"BV1000000000";
    let mut tmp = (MAX_AID | aid) ^ XOR_CODE;
    let mut index = BV_LEN - 1;
    while tmp > 0 {
        bytes[index] = ALPHABET[(tmp % BASE) as usize];
        tmp /= BASE;
        index -= 1;
    }
    bytes.swap(3, 9);
    bytes.swap(4, 7);

    Some(bytes.iter().map(|&b| b as char).collect())
}

/// Decode a `BV` id back to its `av` number.
pub fn bv_to_av(bvid: &str) -> Result<u64, ApiError> {
    let invalid = || ApiError::InvalidId(bvid.to_string());

    if !bvid.starts_with(BV_PREFIX) {
        return Err(invalid());
    }
    let mut bytes: [u8; BV_LEN] = bvid.as_bytes().try_into().map_err(|_| invalid())?;
    bytes.swap(3, 9);
    bytes.swap(4, 7);

    let mut tmp = 0u64;
    for byte in &bytes[BV_PREFIX.len()..] {
        let digit = ALPHABET
            .iter()
            .position(|c| c == byte)
            .ok_or_else(invalid)?;
        tmp = tmp * BASE + digit as u64;
    }

    Ok((tmp & MASK_CODE) ^ XOR_CODE)
}
