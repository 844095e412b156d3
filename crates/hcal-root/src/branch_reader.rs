//! Column extraction from TTree branches over entry ranges.

use std::ops::Range;

use rayon::prelude::*;

use crate::basket::Basket;
use crate::error::{Result, RootError};
use crate::tree::{BranchInfo, LeafType};

/// A jagged column: flat values plus per-entry offsets.
///
/// `offsets.len() == n_entries + 1`; entry `i` owns `flat[offsets[i]..offsets[i + 1]]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JaggedCol {
    pub flat: Vec<f64>,
    pub offsets: Vec<usize>,
}

impl JaggedCol {
    /// Number of entries.
    pub fn n_entries(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Values of entry `row`.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.flat[self.offsets[row]..self.offsets[row + 1]]
    }

    /// Per-entry element counts.
    pub fn counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.offsets.windows(2).map(|w| w[1] - w[0])
    }
}

/// Reads one branch. Only baskets overlapping the requested entry range are decoded.
pub struct BranchReader<'a> {
    file: &'a [u8],
    branch: &'a BranchInfo,
    is_large: bool,
}

impl<'a> BranchReader<'a> {
    pub fn new(file: &'a [u8], branch: &'a BranchInfo, is_large: bool) -> Self {
        Self { file, branch, is_large }
    }

    pub fn branch(&self) -> &BranchInfo {
        self.branch
    }

    /// One value per entry for a scalar branch.
    pub fn read_f64(&self, range: Range<u64>) -> Result<Vec<f64>> {
        let leaf = self.leaf_type()?;
        self.read_scalar(range, |b| Ok(leaf.decode_f64(b)))
    }

    /// One unsigned integer per entry for a scalar branch, decoded without going through
    /// `f64` (event numbers are `ULong64_t`).
    pub fn read_u64(&self, range: Range<u64>) -> Result<Vec<u64>> {
        let leaf = self.leaf_type()?;
        self.read_scalar(range, |b| {
            leaf.decode_u64(b).ok_or_else(|| {
                RootError::TypeMismatch(format!(
                    "branch '{}': {} is not an unsigned integer",
                    self.branch.name,
                    leaf.decode_f64(b)
                ))
            })
        })
    }

    fn read_scalar<T>(
        &self,
        range: Range<u64>,
        decode: impl Fn(&[u8]) -> Result<T>,
    ) -> Result<Vec<T>> {
        let es = self.leaf_type()?.byte_size();
        let mut out = Vec::with_capacity((range.end - range.start) as usize);
        for (first, basket) in self.baskets_for(&range)? {
            self.check_scalar(&basket, es)?;
            let (lo, hi) = local_window(first, basket.n_entries, &range);
            for b in basket.data[lo * es..hi * es].chunks_exact(es) {
                out.push(decode(b)?);
            }
        }
        Ok(out)
    }

    /// A basket without an offset table must hold exactly one element per entry.
    fn check_scalar(&self, basket: &Basket, es: usize) -> Result<()> {
        if basket.data.len() != basket.n_entries * es {
            return Err(RootError::TypeMismatch(format!(
                "branch '{}' is not scalar: {} bytes for {} entries",
                self.branch.name,
                basket.data.len(),
                basket.n_entries
            )));
        }
        Ok(())
    }

    /// Variable-length values per entry. Scalar branches come back with one value per entry.
    pub fn read_jagged_f64(&self, range: Range<u64>) -> Result<JaggedCol> {
        let leaf = self.leaf_type()?;
        let es = leaf.byte_size();
        let mut col = JaggedCol { flat: Vec::new(), offsets: vec![0] };
        for (first, basket) in self.baskets_for(&range)? {
            if basket.entry_offsets.is_none() && !self.branch.is_jagged() {
                self.check_scalar(&basket, es)?;
            }
            let (lo, hi) = local_window(first, basket.n_entries, &range);
            for i in lo..hi {
                let bytes = match basket.entry_range(i) {
                    Some(r) => &basket.data[r],
                    None if !self.branch.is_jagged() => &basket.data[i * es..(i + 1) * es],
                    None => {
                        return Err(RootError::Deserialization(format!(
                            "branch '{}': basket at entry {first} has no offset table",
                            self.branch.name
                        )));
                    }
                };
                if bytes.len() % es != 0 {
                    return Err(RootError::TypeMismatch(format!(
                        "branch '{}': entry of {} bytes is not a multiple of {es}",
                        self.branch.name,
                        bytes.len()
                    )));
                }
                col.flat.extend(bytes.chunks_exact(es).map(|b| leaf.decode_f64(b)));
                col.offsets.push(col.flat.len());
            }
        }
        Ok(col)
    }

    /// All entries of a scalar branch.
    pub fn as_f64(&self) -> Result<Vec<f64>> {
        self.read_f64(0..self.branch.entries)
    }

    fn leaf_type(&self) -> Result<LeafType> {
        self.branch.leaf_type.ok_or_else(|| {
            RootError::TypeMismatch(format!(
                "branch '{}' has no primitive leaf ({})",
                self.branch.name, self.branch.leaf_title
            ))
        })
    }

    /// Decode, in parallel, the baskets overlapping `range`, paired with their first entry.
    fn baskets_for(&self, range: &Range<u64>) -> Result<Vec<(u64, Basket)>> {
        if range.start > range.end || range.end > self.branch.entries {
            return Err(RootError::Deserialization(format!(
                "entry range {range:?} outside branch '{}' with {} entries",
                self.branch.name, self.branch.entries
            )));
        }
        let wanted: Vec<(usize, u64)> = (0..self.branch.n_baskets())
            .filter_map(|i| {
                let (first, end) = self.branch.basket_span(i);
                (first < range.end && end > range.start).then_some((i, first))
            })
            .collect();
        log::trace!("branch '{}': {} baskets for {range:?}", self.branch.name, wanted.len());

        wanted
            .into_par_iter()
            .map(|(i, first)| {
                let basket = Basket::read(self.file, self.branch.basket_seek[i], self.is_large)?;
                let (_, end) = self.branch.basket_span(i);
                if basket.n_entries as u64 != end - first {
                    return Err(RootError::Deserialization(format!(
                        "branch '{}' basket {i}: {} entries, index says {}",
                        self.branch.name,
                        basket.n_entries,
                        end - first
                    )));
                }
                Ok((first, basket))
            })
            .collect()
    }
}

/// Basket-local `[lo, hi)` of the entries in `range`.
fn local_window(first: u64, n: usize, range: &Range<u64>) -> (usize, usize) {
    let lo = range.start.saturating_sub(first) as usize;
    let hi = (range.end.saturating_sub(first) as usize).min(n);
    (lo.min(hi), hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basket::encode_basket;

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    /// Two baskets: entries 0..3 and 3..5.
    fn scalar_file() -> (Vec<u8>, BranchInfo) {
        let mut file = vec![0u8; 8];
        let s0 = file.len() as u32;
        file.extend(encode_basket(s0, &f32_bytes(&[1.0, 2.0, 3.0]), None, 3));
        let s1 = file.len() as u32;
        file.extend(encode_basket(s1, &f32_bytes(&[4.0, 5.0]), None, 2));
        let info = BranchInfo {
            name: "x".into(),
            leaf_type: Some(LeafType::F32),
            leaf_title: "x/F".into(),
            entry_offset_len: 0,
            entries: 5,
            basket_entry: vec![0, 3, 5],
            basket_seek: vec![u64::from(s0), u64::from(s1)],
        };
        (file, info)
    }

    #[test]
    fn scalar_range_spans_baskets() {
        let (file, info) = scalar_file();
        let r = BranchReader::new(&file, &info, false);
        assert_eq!(r.as_f64().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(r.read_f64(2..4).unwrap(), vec![3.0, 4.0]);
        assert_eq!(r.read_f64(3..3).unwrap(), Vec::<f64>::new());
        assert!(r.read_f64(0..6).is_err());
    }

    #[test]
    fn jagged_range_keeps_event_boundaries() {
        // entries: [1, 2], [], [3] | [4, 5, 6]
        let mut file = Vec::new();
        file.extend(encode_basket(0, &f32_bytes(&[1.0, 2.0, 3.0]), Some(&[8, 0, 4]), 3));
        let s1 = file.len() as u32;
        file.extend(encode_basket(s1, &f32_bytes(&[4.0, 5.0, 6.0]), Some(&[12]), 1));
        let info = BranchInfo {
            name: "DigiHB_fc0".into(),
            leaf_type: Some(LeafType::F32),
            leaf_title: "DigiHB_fc0[nDigiHB]/F".into(),
            entry_offset_len: 40,
            entries: 4,
            basket_entry: vec![0, 3, 4],
            basket_seek: vec![0, u64::from(s1)],
        };
        let r = BranchReader::new(&file, &info, false);

        let all = r.read_jagged_f64(0..4).unwrap();
        assert_eq!(all.offsets, vec![0, 2, 2, 3, 6]);
        assert_eq!(all.flat, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let tail = r.read_jagged_f64(1..4).unwrap();
        assert_eq!(tail.n_entries(), 3);
        assert_eq!(tail.counts().collect::<Vec<_>>(), vec![0, 1, 3]);
        assert_eq!(tail.row(2), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn scalar_branch_reads_as_single_element_rows() {
        let (file, info) = scalar_file();
        let col = BranchReader::new(&file, &info, false).read_jagged_f64(1..4).unwrap();
        assert_eq!(col.offsets, vec![0, 1, 2, 3]);
        assert_eq!(col.flat, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn truncated_scalar_basket_is_an_error() {
        let (mut file, mut info) = scalar_file();
        // the second basket claims 3 entries but holds only 2
        file.truncate(info.basket_seek[1] as usize);
        let s1 = file.len() as u32;
        file.extend(encode_basket(s1, &f32_bytes(&[4.0, 5.0]), None, 3));
        info.basket_entry = vec![0, 3, 6];
        info.entries = 6;
        let r = BranchReader::new(&file, &info, false);
        assert!(matches!(r.read_jagged_f64(0..6), Err(RootError::TypeMismatch(_))));
        assert!(matches!(r.read_f64(3..6), Err(RootError::TypeMismatch(_))));
        assert_eq!(r.read_jagged_f64(0..3).unwrap().flat, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn large_event_numbers_stay_exact() {
        let big = (1u64 << 53) + 1;
        let data: Vec<u8> = [big, 7].iter().flat_map(|v| v.to_be_bytes()).collect();
        let file = encode_basket(0, &data, None, 2);
        let info = BranchInfo {
            name: "event".into(),
            leaf_type: Some(LeafType::U64),
            leaf_title: "event/l".into(),
            entry_offset_len: 0,
            entries: 2,
            basket_entry: vec![0, 2],
            basket_seek: vec![0],
        };
        let r = BranchReader::new(&file, &info, false);
        assert_eq!(r.read_u64(0..2).unwrap(), vec![big, 7]);
        assert_ne!(r.read_f64(0..1).unwrap()[0] as u64, big);
    }

    #[test]
    fn negative_values_are_not_event_numbers() {
        let data: Vec<u8> = [-1i32, 5].iter().flat_map(|v| v.to_be_bytes()).collect();
        let file = encode_basket(0, &data, None, 2);
        let info = BranchInfo {
            name: "bunchCrossing".into(),
            leaf_type: Some(LeafType::I32),
            leaf_title: "bunchCrossing/I".into(),
            entry_offset_len: 0,
            entries: 2,
            basket_entry: vec![0, 2],
            basket_seek: vec![0],
        };
        let r = BranchReader::new(&file, &info, false);
        assert!(matches!(r.read_u64(0..2), Err(RootError::TypeMismatch(_))));
        assert_eq!(r.read_u64(1..2).unwrap(), vec![5]);
    }

    #[test]
    fn local_window_clamps() {
        assert_eq!(local_window(10, 5, &(0..100)), (0, 5));
        assert_eq!(local_window(10, 5, &(12..13)), (2, 3));
        assert_eq!(local_window(10, 5, &(0..10)), (0, 0));
    }
}
