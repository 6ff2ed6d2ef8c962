// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Generic two-level packed container.
//!
//! Stores N "outer" rows, each owning a contiguous variable-length run
//! of inner records, without per-row allocation. Row `i` owns records
//! `[header[i].offset, header[i+1].offset)`; a sentinel header closes
//! the last range, so `headers.len() == outer_count + 1`.
//!
//! All structural invariants (monotonic offsets, in-range sentinel)
//! are validated when a container is adopted from bytes or sealed by
//! the builder. Hot-path reads are therefore plain slice indexing.

use bytemuck::Pod;

use crate::error::{SolverError, SolverResult};

/// An outer-row header of a [`PackedArray`].
///
/// Carries the record-range start offset plus whatever per-row payload
/// the concrete table needs (e.g. a compressed sky factor).
pub trait PackedHeader: Pod {
    /// Per-row payload stored alongside the offset.
    type Payload: Default;

    /// Builds a header for a row whose records start at `record_offset`.
    fn with_offset(record_offset: u32, payload: Self::Payload) -> Self;

    /// The index of the first inner record owned by this row.
    fn record_offset(&self) -> u32;
}

/// Section counts serialized in front of a packed array.
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
struct SectionCounts {
    outer: u32,
    records: u32,
}

/// A sealed two-level packed container. See the module docs.
#[derive(Debug, Clone)]
pub struct PackedArray<H: PackedHeader, R: Pod> {
    headers: Vec<H>,
    records: Vec<R>,
}

impl<H: PackedHeader, R: Pod> PackedArray<H, R> {
    /// Number of outer rows.
    #[inline]
    pub fn outer_count(&self) -> usize {
        self.headers.len() - 1
    }

    /// Total number of inner records across all rows.
    #[inline]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// The header of row `outer`.
    ///
    /// Panics if `outer >= outer_count()`; indices come from the same
    /// validated dataset, so this is a programmer error. The sentinel
    /// header is excluded from the indexable range.
    #[inline]
    pub fn header(&self, outer: usize) -> &H {
        &self.headers[..self.outer_count()][outer]
    }

    /// The contiguous record run owned by row `outer`.
    #[inline]
    pub fn records(&self, outer: usize) -> &[R] {
        let begin = self.headers[outer].record_offset() as usize;
        let end = self.headers[outer + 1].record_offset() as usize;
        &self.records[begin..end]
    }

    /// Serialized size in bytes, counts prefix included.
    pub fn byte_len(&self) -> usize {
        std::mem::size_of::<SectionCounts>()
            + std::mem::size_of_val(self.headers.as_slice())
            + std::mem::size_of_val(self.records.as_slice())
    }

    /// Serializes the container into one contiguous byte buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let counts = SectionCounts {
            outer: self.outer_count() as u32,
            records: self.record_count() as u32,
        };
        let mut out = Vec::with_capacity(self.byte_len());
        out.extend_from_slice(bytemuck::bytes_of(&counts));
        out.extend_from_slice(bytemuck::cast_slice(&self.headers));
        out.extend_from_slice(bytemuck::cast_slice(&self.records));
        out
    }

    /// Adopts a buffer previously produced by [`PackedArray::to_bytes`].
    ///
    /// The full header layout is validated here: exact section length,
    /// monotonically non-decreasing offsets, and a sentinel equal to
    /// the record count. `section` names the buffer in errors.
    pub fn from_bytes(section: &'static str, bytes: &[u8]) -> SolverResult<Self> {
        let counts_len = std::mem::size_of::<SectionCounts>();
        if bytes.len() < counts_len {
            return Err(SolverError::MalformedSection(section));
        }
        let counts: SectionCounts = bytemuck::pod_read_unaligned(&bytes[..counts_len]);
        let outer = counts.outer as usize;
        let records = counts.records as usize;

        let header_bytes = (outer + 1)
            .checked_mul(std::mem::size_of::<H>())
            .ok_or(SolverError::MalformedSection(section))?;
        let record_bytes = records
            .checked_mul(std::mem::size_of::<R>())
            .ok_or(SolverError::MalformedSection(section))?;
        let expected = counts_len + header_bytes + record_bytes;
        if bytes.len() != expected {
            return Err(SolverError::MalformedSection(section));
        }

        let headers: Vec<H> =
            bytemuck::pod_collect_to_vec(&bytes[counts_len..counts_len + header_bytes]);
        let records_vec: Vec<R> = bytemuck::pod_collect_to_vec(&bytes[counts_len + header_bytes..]);

        let array = Self {
            headers,
            records: records_vec,
        };
        array.validate(section)?;
        Ok(array)
    }

    fn validate(&self, section: &'static str) -> SolverResult<()> {
        let total = self.records.len() as u32;
        let mut previous = 0u32;
        for (i, h) in self.headers.iter().enumerate() {
            let offset = h.record_offset();
            if offset < previous || offset > total {
                return Err(SolverError::MalformedSection(section));
            }
            if i == 0 && offset != 0 {
                return Err(SolverError::MalformedSection(section));
            }
            previous = offset;
        }
        if previous != total {
            return Err(SolverError::MalformedSection(section));
        }
        Ok(())
    }
}

/// Incremental-fill constructor for [`PackedArray`].
///
/// The caller declares the outer-row count and total record count up
/// front, then calls [`PackedArrayBuilder::begin_outer`] /
/// [`PackedArrayBuilder::push_record`] in strict sequence. Any
/// out-of-order or over-count call is a checked contract violation;
/// the container type itself is only obtainable through
/// [`PackedArrayBuilder::finish`], so an unsealed or inconsistent
/// array is unrepresentable.
#[derive(Debug)]
pub struct PackedArrayBuilder<H: PackedHeader, R: Pod> {
    headers: Vec<H>,
    records: Vec<R>,
    declared_outer: usize,
    declared_records: usize,
}

impl<H: PackedHeader, R: Pod> PackedArrayBuilder<H, R> {
    /// Creates a builder for `outer_count` rows and `record_count`
    /// total inner records.
    pub fn new(outer_count: usize, record_count: usize) -> Self {
        Self {
            headers: Vec::with_capacity(outer_count + 1),
            records: Vec::with_capacity(record_count),
            declared_outer: outer_count,
            declared_records: record_count,
        }
    }

    /// Starts the next outer row. Records pushed afterwards belong to
    /// this row until the next `begin_outer` call.
    pub fn begin_outer(&mut self, payload: H::Payload) -> SolverResult<()> {
        if self.headers.len() == self.declared_outer {
            return Err(SolverError::BuilderContract(
                "begin_outer called more times than the declared outer count",
            ));
        }
        self.headers
            .push(H::with_offset(self.records.len() as u32, payload));
        Ok(())
    }

    /// Appends an inner record to the current outer row.
    pub fn push_record(&mut self, record: R) -> SolverResult<()> {
        if self.headers.is_empty() {
            return Err(SolverError::BuilderContract(
                "push_record called before the first begin_outer",
            ));
        }
        if self.records.len() == self.declared_records {
            return Err(SolverError::BuilderContract(
                "push_record called more times than the declared record count",
            ));
        }
        self.records.push(record);
        Ok(())
    }

    /// Seals the builder into an immutable [`PackedArray`].
    ///
    /// Fails if fewer rows or records were supplied than declared.
    pub fn finish(mut self) -> SolverResult<PackedArray<H, R>> {
        if self.headers.len() != self.declared_outer {
            return Err(SolverError::BuilderContract(
                "finish called before all declared outer rows were begun",
            ));
        }
        if self.records.len() != self.declared_records {
            return Err(SolverError::BuilderContract(
                "finish called before all declared records were pushed",
            ));
        }
        // Sentinel closes the last row's range.
        self.headers.push(H::with_offset(
            self.records.len() as u32,
            H::Payload::default(),
        ));
        Ok(PackedArray {
            headers: self.headers,
            records: self.records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    #[repr(C)]
    struct PlainHeader {
        offset: u32,
    }

    impl PackedHeader for PlainHeader {
        type Payload = ();

        fn with_offset(record_offset: u32, _payload: ()) -> Self {
            Self {
                offset: record_offset,
            }
        }

        fn record_offset(&self) -> u32 {
            self.offset
        }
    }

    fn build_3x4() -> PackedArray<PlainHeader, u32> {
        let mut builder = PackedArrayBuilder::<PlainHeader, u32>::new(3, 4);
        builder.begin_outer(()).unwrap();
        builder.push_record(10).unwrap();
        builder.push_record(11).unwrap();
        builder.begin_outer(()).unwrap();
        builder.begin_outer(()).unwrap();
        builder.push_record(30).unwrap();
        builder.push_record(31).unwrap();
        builder.finish().unwrap()
    }

    #[test]
    fn rows_own_their_ranges() {
        let array = build_3x4();
        assert_eq!(array.outer_count(), 3);
        assert_eq!(array.record_count(), 4);
        assert_eq!(array.records(0), &[10, 11]);
        assert_eq!(array.records(1), &[] as &[u32]);
        assert_eq!(array.records(2), &[30, 31]);
    }

    #[test]
    #[should_panic]
    fn sentinel_header_is_not_indexable() {
        let array = build_3x4();
        let _ = array.header(array.outer_count());
    }

    #[test]
    fn byte_round_trip_preserves_layout() {
        let array = build_3x4();
        let bytes = array.to_bytes();
        assert_eq!(bytes.len(), array.byte_len());
        let restored = PackedArray::<PlainHeader, u32>::from_bytes("test", &bytes).unwrap();
        assert_eq!(restored.outer_count(), 3);
        for outer in 0..3 {
            assert_eq!(restored.records(outer), array.records(outer));
        }
    }

    #[test]
    fn out_of_order_calls_are_rejected() {
        let mut builder = PackedArrayBuilder::<PlainHeader, u32>::new(1, 1);
        assert!(matches!(
            builder.push_record(0),
            Err(SolverError::BuilderContract(_))
        ));
        builder.begin_outer(()).unwrap();
        assert!(matches!(
            builder.begin_outer(()),
            Err(SolverError::BuilderContract(_))
        ));
        builder.push_record(0).unwrap();
        assert!(matches!(
            builder.push_record(1),
            Err(SolverError::BuilderContract(_))
        ));
    }

    #[test]
    fn finish_requires_declared_counts() {
        let mut builder = PackedArrayBuilder::<PlainHeader, u32>::new(2, 1);
        builder.begin_outer(()).unwrap();
        assert!(matches!(
            builder.finish(),
            Err(SolverError::BuilderContract(_))
        ));
    }

    #[test]
    fn truncated_bytes_are_rejected() {
        let array = build_3x4();
        let bytes = array.to_bytes();
        let truncated = &bytes[..bytes.len() - 1];
        assert!(matches!(
            PackedArray::<PlainHeader, u32>::from_bytes("test", truncated),
            Err(SolverError::MalformedSection("test"))
        ));
    }

    #[test]
    fn non_monotonic_offsets_are_rejected() {
        let array = build_3x4();
        let mut bytes = array.to_bytes();
        // Corrupt the second header's offset to run past the sentinel.
        let header_base = std::mem::size_of::<SectionCounts>() + std::mem::size_of::<PlainHeader>();
        bytes[header_base..header_base + 4].copy_from_slice(&200u32.to_ne_bytes());
        assert!(matches!(
            PackedArray::<PlainHeader, u32>::from_bytes("test", &bytes),
            Err(SolverError::MalformedSection("test"))
        ));
    }
}
