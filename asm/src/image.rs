use crate::parser::Location;
use serde::Serialize;

/// Bytes emitted by one source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Emission {
    pub loc: Location,
    pub address: u16,
    pub offset: usize,
    pub len: usize,
}

/// Assembled output: emitted bytes in source order, plus where each line's
/// bytes live in the address space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramImage {
    bytes: Vec<u8>,
    records: Vec<Emission>,
}

impl ProgramImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, loc: Location, address: u16, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.records.push(Emission {
            loc,
            address,
            offset: self.bytes.len(),
            len: data.len(),
        });
        self.bytes.extend_from_slice(data);
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn records(&self) -> &[Emission] {
        &self.records
    }

    /// Byte offset holding `address`, if anything was emitted there.
    /// Later emissions win over earlier ones at the same address.
    pub fn offset_of(&self, address: u16) -> Option<usize> {
        self.records.iter().rev().find_map(|rec| {
            let delta = address.wrapping_sub(rec.address) as usize;
            (delta < rec.len).then_some(rec.offset + delta)
        })
    }

    /// Bytes emitted for one source line.
    pub fn line_bytes(&self, loc: Location) -> Option<&[u8]> {
        self.records
            .iter()
            .find(|rec| rec.loc == loc)
            .map(|rec| &self.bytes[rec.offset..rec.offset + rec.len])
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
