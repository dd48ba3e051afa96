//! Telephone events (RFC 4733)
//!
//! DTMF digits travel in the same RTP stream as the voice they interrupt.
//! Event packets carry no audio; the events are recorded for diagnostics.

use crate::error::{CodecError, Result};
use crate::types::{AudioDecoder, CodecInfo};

/// One named event as carried in an event packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelephoneEvent {
    /// Event code (0-9, 10 = '*', 11 = '#', 12-15 = A-D)
    pub event: u8,
    /// Final packet of the event
    pub end: bool,
    /// Volume in -dBm0
    pub volume: u8,
    /// Duration in timestamp units
    pub duration: u16,
}

impl TelephoneEvent {
    /// Parse the four-byte event payload
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < 4 {
            return Err(CodecError::invalid_payload(format!(
                "telephone-event payload of {} bytes",
                payload.len()
            )));
        }
        Ok(Self {
            event: payload[0],
            end: payload[1] & 0x80 != 0,
            volume: payload[1] & 0x3F,
            duration: u16::from_be_bytes([payload[2], payload[3]]),
        })
    }

    /// DTMF digit for events 0-15
    pub fn digit(&self) -> Option<char> {
        match self.event {
            0..=9 => Some(char::from(b'0' + self.event)),
            10 => Some('*'),
            11 => Some('#'),
            12..=15 => Some(char::from(b'A' + self.event - 12)),
            _ => None,
        }
    }
}

/// Event "decoder": records completed digits, produces no samples
#[derive(Debug, Clone)]
pub struct TelephoneEventDecoder {
    info: CodecInfo,
    digits: String,
    in_event: bool,
}

impl TelephoneEventDecoder {
    pub fn new(info: CodecInfo) -> Self {
        Self {
            info,
            digits: String::new(),
            in_event: false,
        }
    }

    /// Digits completed so far
    pub fn digits(&self) -> &str {
        &self.digits
    }
}

impl AudioDecoder for TelephoneEventDecoder {
    fn decode(&mut self, payload: &[u8]) -> Result<Vec<i16>> {
        let event = TelephoneEvent::parse(payload)?;
        // End packets are sent three times
        if event.end && self.in_event {
            if let Some(digit) = event.digit() {
                self.digits.push(digit);
            }
        }
        self.in_event = !event.end;
        Ok(Vec::new())
    }

    fn info(&self) -> CodecInfo {
        self.info.clone()
    }

    fn reset(&mut self) {
        self.digits.clear();
        self.in_event = false;
    }
}
