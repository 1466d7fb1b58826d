//! Advertisement data (AD structure) parsing.
//!
//! A BLE advertisement payload is a flat sequence of length-prefixed,
//! type-tagged records:
//!
//! ```text
//! | len | type | data[len-1] | len | type | data[len-1] | ...
//! ```
//!
//! The length octet counts everything after itself (type + data), so a
//! record occupies `len + 1` bytes. A zero length octet terminates the
//! payload early. Radio peers are not trusted: every access is
//! bounds-checked and a record claiming more bytes than remain aborts
//! the walk instead of reading past the buffer.

use heapless::String;

/// Incomplete list of 16-bit service UUIDs.
pub const AD_UUID16_SOME: u8 = 0x02;
/// Complete list of 16-bit service UUIDs.
pub const AD_UUID16_ALL: u8 = 0x03;
/// Shortened local name.
pub const AD_NAME_SHORT: u8 = 0x08;
/// Complete local name.
pub const AD_NAME_COMPLETE: u8 = 0x09;

/// One AD structure, viewed in place inside the advertisement buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdStructure<'a> {
    /// AD type octet.
    pub ad_type: u8,
    /// Value of the length octet (covers the type octet plus data).
    pub len: u8,
    /// Payload bytes after the type octet (`len - 1` of them).
    pub data: &'a [u8],
}

/// How a walk over an advertisement payload ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseEnd {
    /// Reached the end of the buffer or a zero-length terminator.
    Complete,
    /// The visitor asked to stop.
    Stopped,
    /// A record claimed more bytes than remain; the rest of the buffer
    /// was not examined.
    Malformed,
}

/// Walk the AD structures in `data`, invoking `visit` for each record.
///
/// The visitor returns `true` to keep going, `false` to stop the walk
/// (e.g. the record of interest was found). Visits already made stand
/// even when a later record turns out to be malformed.
pub fn parse_ad(data: &[u8], mut visit: impl FnMut(AdStructure<'_>) -> bool) -> ParseEnd {
    let mut off = 0;
    while off < data.len() {
        let len = data[off] as usize;
        if len == 0 {
            // Early-termination marker, not an error.
            return ParseEnd::Complete;
        }

        let remaining = data.len() - off;
        if len + 1 > remaining || remaining < 2 {
            return ParseEnd::Malformed;
        }

        let record = AdStructure {
            ad_type: data[off + 1],
            len: len as u8,
            data: &data[off + 2..off + 1 + len],
        };
        if !visit(record) {
            return ParseEnd::Stopped;
        }

        off += len + 1;
    }
    ParseEnd::Complete
}

/// Check whether the payload advertises the given 16-bit service UUID.
///
/// Scans the incomplete/complete UUID16 list records. Entries are
/// little-endian on the wire and compared in host order. A list whose
/// payload is not a whole number of 2-byte entries is skipped; the rest
/// of the payload is still examined.
pub fn advertises_service_uuid16(data: &[u8], uuid: u16) -> bool {
    let mut found = false;
    parse_ad(data, |rec| {
        if rec.ad_type != AD_UUID16_SOME && rec.ad_type != AD_UUID16_ALL {
            return true;
        }
        if rec.data.len() % 2 != 0 {
            // Truncated UUID list; ignore this record only.
            return true;
        }
        for chunk in rec.data.chunks_exact(2) {
            if u16::from_le_bytes([chunk[0], chunk[1]]) == uuid {
                found = true;
                return false;
            }
        }
        true
    });
    found
}

/// Extract the complete/shortened local name from advertisement data.
pub fn extract_device_name(data: &[u8]) -> String<32> {
    let mut name: Option<String<32>> = None;
    parse_ad(data, |rec| {
        if rec.ad_type == AD_NAME_SHORT || rec.ad_type == AD_NAME_COMPLETE {
            let mut s = String::new();
            for &b in rec.data {
                if s.push(b as char).is_err() {
                    break;
                }
            }
            name = Some(s);
            return false;
        }
        true
    });
    name.unwrap_or_else(|| {
        let mut s = String::new();
        let _ = s.push_str("Unknown");
        s
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════
