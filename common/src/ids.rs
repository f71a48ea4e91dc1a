// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Identifiers for the devices making up a simulated PON tree.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// The ID of a PON port on the OLT.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    Serialize,
    JsonSchema,
)]
#[serde(transparent)]
pub struct PonId(pub u32);

impl From<PonId> for u32 {
    fn from(p: PonId) -> Self {
        p.0
    }
}

impl From<u32> for PonId {
    fn from(p: u32) -> Self {
        PonId(p)
    }
}

impl fmt::Display for PonId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The ID of an ONU within its PON port.  Unique only in combination with
/// the owning [`PonId`].
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    Serialize,
    JsonSchema,
)]
#[serde(transparent)]
pub struct OnuId(pub u32);

impl From<OnuId> for u32 {
    fn from(o: OnuId) -> Self {
        o.0
    }
}

impl From<u32> for OnuId {
    fn from(o: u32) -> Self {
        OnuId(o)
    }
}

impl fmt::Display for OnuId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The logical port number identifying an ONU's UNI on the north-bound
/// interface.  The encoding packs the PON ID into the upper bits.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    Serialize,
    JsonSchema,
)]
#[serde(transparent)]
pub struct PortNo(pub u32);

impl PortNo {
    pub fn new(pon: PonId, onu: OnuId) -> Self {
        PortNo((pon.0 << 12) | onu.0)
    }
}

impl From<PortNo> for u32 {
    fn from(p: PortNo) -> Self {
        p.0
    }
}

impl fmt::Display for PortNo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of bytes in the vendor ID portion of a serial number.
const VENDOR_ID_LEN: usize = 4;
/// Number of vendor-specific bytes in a serial number.
const VENDOR_SPECIFIC_LEN: usize = 4;

#[derive(Error, Debug, Clone)]
pub enum SerialNumberError {
    #[error("Serial number must be {} characters", VENDOR_ID_LEN + 2 * VENDOR_SPECIFIC_LEN)]
    BadLength,
    #[error("Vendor ID must be 4 ASCII characters")]
    BadVendorId,
    #[error("Vendor-specific portion must be hex digits")]
    BadVendorSpecific,
}

/// An ONU serial number: a 4-byte ASCII vendor ID followed by 4
/// vendor-specific bytes.  Rendered as the vendor ID followed by the
/// vendor-specific bytes in hex, e.g. `BBSM00000001`.
///
/// Serial numbers are assigned at construction and never change.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(try_from = "String", into = "String")]
pub struct SerialNumber {
    vendor_id: [u8; VENDOR_ID_LEN],
    vendor_specific: [u8; VENDOR_SPECIFIC_LEN],
}

impl SerialNumber {
    pub fn new(
        vendor_id: [u8; VENDOR_ID_LEN],
        vendor_specific: [u8; VENDOR_SPECIFIC_LEN],
    ) -> Self {
        SerialNumber {
            vendor_id,
            vendor_specific,
        }
    }

    pub fn vendor_id(&self) -> &[u8] {
        &self.vendor_id
    }

    pub fn vendor_specific(&self) -> &[u8] {
        &self.vendor_specific
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for b in self.vendor_id {
            write!(f, "{}", b as char)?;
        }
        for b in self.vendor_specific {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl FromStr for SerialNumber {
    type Err = SerialNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != VENDOR_ID_LEN + 2 * VENDOR_SPECIFIC_LEN {
            return Err(SerialNumberError::BadLength);
        }
        let (vendor, specific) = s.split_at(VENDOR_ID_LEN);
        if !vendor.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SerialNumberError::BadVendorId);
        }
        let mut vendor_id = [0u8; VENDOR_ID_LEN];
        vendor_id.copy_from_slice(vendor.as_bytes());

        let mut vendor_specific = [0u8; VENDOR_SPECIFIC_LEN];
        for (i, chunk) in specific.as_bytes().chunks(2).enumerate() {
            let octet = std::str::from_utf8(chunk)
                .map_err(|_| SerialNumberError::BadVendorSpecific)?;
            vendor_specific[i] = u8::from_str_radix(octet, 16)
                .map_err(|_| SerialNumberError::BadVendorSpecific)?;
        }
        Ok(SerialNumber {
            vendor_id,
            vendor_specific,
        })
    }
}

impl TryFrom<String> for SerialNumber {
    type Error = SerialNumberError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SerialNumber> for String {
    fn from(sn: SerialNumber) -> String {
        sn.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::OnuId;
    use super::PonId;
    use super::PortNo;
    use super::SerialNumber;

    #[test]
    fn test_serial_display() {
        let sn = SerialNumber::new(*b"BBSM", [0, 0, 0, 1]);
        assert_eq!(sn.to_string(), "BBSM00000001");
    }

    #[test]
    fn test_serial_roundtrip() {
        let sn = SerialNumber::new(*b"BBSM", [0, 2, 0, 0x1f]);
        let parsed: SerialNumber = sn.to_string().parse().unwrap();
        assert_eq!(sn, parsed);
    }

    #[test]
    fn test_serial_bad_length() {
        assert!("BBSM0001".parse::<SerialNumber>().is_err());
    }

    #[test]
    fn test_serial_bad_hex() {
        assert!("BBSM0000000z".parse::<SerialNumber>().is_err());
    }

    #[test]
    fn test_port_no_packs_pon() {
        assert_eq!(PortNo::new(PonId(0), OnuId(1)).0, 1);
        assert_eq!(PortNo::new(PonId(2), OnuId(3)).0, (2 << 12) | 3);
    }
}
