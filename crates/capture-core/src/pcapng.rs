//! pcapng container
//!
//! Every block is framed as `type | total length | body | total length`.
//! A Section Header Block fixes the byte order for the blocks following it
//! and resets the interface table. Interface Description Blocks carry the
//! link type and timestamp resolution used by the packet blocks referring
//! to them.

use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

use crate::error::{CaptureError, Result};
use crate::frame::{LinkType, RawRecord};
use crate::pcap::MAX_RECORD_LEN;
use crate::Endian;

pub const BLOCK_SECTION_HEADER: u32 = 0x0A0D_0D0A;
pub const BLOCK_INTERFACE_DESCRIPTION: u32 = 0x0000_0001;
pub const BLOCK_SIMPLE_PACKET: u32 = 0x0000_0003;
pub const BLOCK_ENHANCED_PACKET: u32 = 0x0000_0006;

const BYTE_ORDER_MAGIC: u32 = 0x1A2B_3C4D;
const OPTION_END: u16 = 0;
const OPTION_IF_TSRESOL: u16 = 9;
const MIN_BLOCK_LEN: usize = 12;
const DEFAULT_UNITS_PER_SEC: u64 = 1_000_000;

#[derive(Debug, Clone, Copy)]
struct Interface {
    link_type: LinkType,
    units_per_sec: u64,
}

/// Decode an `if_tsresol` option value into timestamp units per second
fn units_per_sec(tsresol: u8) -> u64 {
    let exponent = u32::from(tsresol & 0x7F);
    if tsresol & 0x80 == 0 {
        10u64.checked_pow(exponent).unwrap_or(DEFAULT_UNITS_PER_SEC)
    } else {
        1u64.checked_shl(exponent).unwrap_or(DEFAULT_UNITS_PER_SEC)
    }
}

fn timestamp(units: u64, units_per_sec: u64) -> Duration {
    let units_per_sec = units_per_sec.max(1);
    let secs = units / units_per_sec;
    let frac = units % units_per_sec;
    let nanos = (u128::from(frac) * 1_000_000_000 / u128::from(units_per_sec)) as u32;
    Duration::new(secs, nanos)
}

/// Read the byte-order magic of a section header starting at `offset`
fn section_endian(data: &[u8], offset: usize) -> Option<Endian> {
    let magic = data.get(offset + 8..offset + 12)?;
    if Endian::Little.u32(magic) == BYTE_ORDER_MAGIC {
        Some(Endian::Little)
    } else if Endian::Big.u32(magic) == BYTE_ORDER_MAGIC {
        Some(Endian::Big)
    } else {
        None
    }
}

/// Whether `data` starts with a pcapng section header
pub fn is_pcapng(data: &[u8]) -> bool {
    data.len() >= 4 && Endian::Little.u32(&data[0..4]) == BLOCK_SECTION_HEADER
}

/// Iterates the packet records of a pcapng file
#[derive(Clone)]
pub struct PcapngRecords {
    data: Bytes,
    offset: usize,
    endian: Endian,
    interfaces: Vec<Interface>,
    sections: usize,
    next_index: u64,
    done: bool,
}

impl PcapngRecords {
    /// Open a pcapng buffer; the first block must be a valid section header
    pub fn new(data: Bytes) -> Result<Self> {
        if !is_pcapng(&data) {
            return Err(CaptureError::malformed_capture(
                "pcapng capture does not start with a section header block",
            ));
        }
        if data.len() < 28 {
            return Err(CaptureError::malformed_capture(format!(
                "pcapng section header needs 28 bytes, got {}",
                data.len()
            )));
        }
        let endian = section_endian(&data, 0).ok_or_else(|| {
            CaptureError::malformed_capture("pcapng section header has an invalid byte-order magic")
        })?;
        let major = endian.u16(&data[12..14]);
        if major != 1 {
            return Err(CaptureError::malformed_capture(format!(
                "unsupported pcapng version {}.{}",
                major,
                endian.u16(&data[14..16])
            )));
        }
        let block_len = endian.u32(&data[4..8]) as usize;
        if block_len < 28 || block_len % 4 != 0 || block_len > data.len() {
            return Err(CaptureError::malformed_capture(format!(
                "pcapng section header declares an invalid length {}",
                block_len
            )));
        }

        Ok(Self {
            data,
            offset: block_len,
            endian,
            interfaces: Vec::new(),
            sections: 1,
            next_index: 1,
            done: false,
        })
    }

    /// Number of sections seen so far
    pub fn sections(&self) -> usize {
        self.sections
    }

    fn take_index(&mut self) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    fn read_interface(&mut self, body: &[u8]) {
        let endian = self.endian;
        if body.len() < 8 {
            // Keep interface ids aligned even when the description is unusable
            self.interfaces.push(Interface {
                link_type: LinkType::Other(u32::MAX),
                units_per_sec: DEFAULT_UNITS_PER_SEC,
            });
            return;
        }
        let link_type = LinkType::from_code(u32::from(endian.u16(&body[0..2])));
        let mut units = DEFAULT_UNITS_PER_SEC;

        let mut cursor = 8;
        while cursor + 4 <= body.len() {
            let code = endian.u16(&body[cursor..cursor + 2]);
            let len = endian.u16(&body[cursor + 2..cursor + 4]) as usize;
            if code == OPTION_END {
                break;
            }
            let value_start = cursor + 4;
            if value_start + len > body.len() {
                break;
            }
            if code == OPTION_IF_TSRESOL && len >= 1 {
                units = units_per_sec(body[value_start]);
            }
            cursor = value_start + ((len + 3) & !3);
        }

        debug!(
            "pcapng interface {}: link type {}, {} ts units/s",
            self.interfaces.len(),
            link_type,
            units
        );
        self.interfaces.push(Interface {
            link_type,
            units_per_sec: units,
        });
    }

    fn enhanced_packet(&mut self, body: &[u8]) -> Result<RawRecord> {
        let index = self.take_index();
        let endian = self.endian;
        if body.len() < 20 {
            return Err(CaptureError::malformed_frame(
                index,
                "enhanced packet block shorter than its fixed fields",
            ));
        }
        let interface_id = endian.u32(&body[0..4]) as usize;
        let ts_high = u64::from(endian.u32(&body[4..8]));
        let ts_low = u64::from(endian.u32(&body[8..12]));
        let captured = endian.u32(&body[12..16]) as usize;
        let original = endian.u32(&body[16..20]) as usize;

        let available = body.len() - 20;
        if captured > available || captured > MAX_RECORD_LEN {
            return Err(CaptureError::TruncatedFrame {
                index,
                declared: captured,
                available,
            });
        }
        let interface = self.interfaces.get(interface_id).copied().ok_or_else(|| {
            CaptureError::malformed_frame(index, format!("unknown interface id {}", interface_id))
        })?;

        let start = self.offset + 8 + 20;
        Ok(RawRecord {
            index,
            timestamp: timestamp((ts_high << 32) | ts_low, interface.units_per_sec),
            link_type: interface.link_type,
            original_len: original,
            data: self.data.slice(start..start + captured),
        })
    }

    fn simple_packet(&mut self, body: &[u8]) -> Result<RawRecord> {
        let index = self.take_index();
        if body.len() < 4 {
            return Err(CaptureError::malformed_frame(
                index,
                "simple packet block shorter than its fixed fields",
            ));
        }
        let original = self.endian.u32(&body[0..4]) as usize;
        let captured = original.min(body.len() - 4);
        let interface = self.interfaces.first().copied().ok_or_else(|| {
            CaptureError::malformed_frame(index, "simple packet block without an interface")
        })?;

        let start = self.offset + 8 + 4;
        Ok(RawRecord {
            index,
            timestamp: Duration::ZERO,
            link_type: interface.link_type,
            original_len: original,
            data: self.data.slice(start..start + captured),
        })
    }
}

impl Iterator for PcapngRecords {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done || self.offset >= self.data.len() {
                return None;
            }

            let remaining = self.data.len() - self.offset;
            if remaining < MIN_BLOCK_LEN {
                self.done = true;
                let index = self.take_index();
                return Some(Err(CaptureError::TruncatedFrame {
                    index,
                    declared: MIN_BLOCK_LEN,
                    available: remaining,
                }));
            }

            let block_type = Endian::Little.u32(&self.data[self.offset..self.offset + 4]);
            let endian = if block_type == BLOCK_SECTION_HEADER {
                match section_endian(&self.data, self.offset) {
                    Some(endian) => endian,
                    None => {
                        self.done = true;
                        let index = self.take_index();
                        return Some(Err(CaptureError::malformed_frame(
                            index,
                            "section header with an invalid byte-order magic",
                        )));
                    }
                }
            } else {
                self.endian
            };
            let block_type = endian.u32(&self.data[self.offset..self.offset + 4]);
            let block_len = endian.u32(&self.data[self.offset + 4..self.offset + 8]) as usize;

            if block_len < MIN_BLOCK_LEN || block_len % 4 != 0 || block_len > remaining {
                // Block framing is lost from here on
                self.done = true;
                let index = self.take_index();
                return Some(Err(CaptureError::TruncatedFrame {
                    index,
                    declared: block_len,
                    available: remaining,
                }));
            }

            let data = self.data.clone();
            let body = &data[self.offset + 8..self.offset + block_len - 4];

            let item = match block_type {
                BLOCK_SECTION_HEADER => {
                    self.endian = endian;
                    self.interfaces.clear();
                    self.sections += 1;
                    debug!("pcapng section #{} starts at offset {}", self.sections, self.offset);
                    None
                }
                BLOCK_INTERFACE_DESCRIPTION => {
                    self.read_interface(body);
                    None
                }
                BLOCK_ENHANCED_PACKET => Some(self.enhanced_packet(body)),
                BLOCK_SIMPLE_PACKET => Some(self.simple_packet(body)),
                _ => None,
            };

            self.offset += block_len;
            if let Some(item) = item {
                return Some(item);
            }
        }
    }
}
