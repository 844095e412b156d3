//! `TTree` / `TBranch` / `TLeaf` streamer decoding.
//!
//! Polymorphic members (`TObjArray` elements, `fLeafCount`) are written with ROOT's
//! class-tag scheme: the first occurrence of a class writes `kNewClassTag` plus its
//! name, later ones write `kClassMask | position` pointing back at it. Positions are
//! counted from the start of the key (header included), so the registry lives for the
//! whole tree payload.

use std::collections::HashMap;

use crate::error::{Result, RootError};
use crate::rbuffer::{BYTE_COUNT_MASK, RBuffer};
use crate::tree::{BranchInfo, LeafType, Tree};

const NEW_CLASS_TAG: u32 = 0xFFFF_FFFF;
const CLASS_MASK: u32 = 0x8000_0000;
/// `kMapOffset`: registry slots are shifted by two so that zero stays the null tag.
const MAP_OFFSET: usize = 2;

/// Decode a `TTree` from its key payload. `key_len` is the header length of that key.
pub fn read_ttree(payload: &[u8], key_len: usize) -> Result<Tree> {
    let mut r = RBuffer::new(payload);
    let mut ctx = StreamerContext { key_len, classes: HashMap::new() };
    ctx.read_tree(&mut r)
}

/// A polymorphic object header.
enum ObjHeader {
    Null,
    /// Back-reference to an object already streamed; nothing follows.
    Reference,
    Object {
        class_name: Option<String>,
        end: usize,
    },
}

struct Leaf {
    leaf_type: Option<LeafType>,
    title: String,
}

struct StreamerContext {
    key_len: usize,
    classes: HashMap<usize, String>,
}

impl StreamerContext {
    fn read_object_header(&mut self, r: &mut RBuffer) -> Result<ObjHeader> {
        let beg = r.pos();
        let first = r.read_u32()?;
        let (tag_pos, tag, end) = if first & BYTE_COUNT_MASK == 0 || first == NEW_CLASS_TAG {
            (beg, first, None)
        } else {
            let end = beg + 4 + (first & !BYTE_COUNT_MASK) as usize;
            (r.pos(), r.read_u32()?, Some(end))
        };

        if tag == 0 {
            return Ok(ObjHeader::Null);
        }
        if tag != NEW_CLASS_TAG && tag & CLASS_MASK == 0 {
            if let Some(end) = end {
                r.set_pos(end);
            }
            return Ok(ObjHeader::Reference);
        }

        let class_name = if tag == NEW_CLASS_TAG {
            let name = r.read_cstring()?;
            self.classes.insert(tag_pos + self.key_len + MAP_OFFSET, name.clone());
            Some(name)
        } else {
            let slot = (tag & !CLASS_MASK) as usize;
            let found = self.classes.get(&slot).cloned();
            if found.is_none() {
                log::debug!("unresolved class reference {slot} at offset {tag_pos}");
            }
            found
        };
        let end = end.ok_or_else(|| {
            RootError::Deserialization(format!("object at offset {beg} has no byte count"))
        })?;
        Ok(ObjHeader::Object { class_name, end })
    }

    /// Walk a `TObjArray`, handing each non-null element to `element`. The cursor is
    /// moved past every element whether or not it decoded.
    fn read_obj_array<T>(
        &mut self,
        r: &mut RBuffer,
        mut element: impl FnMut(&mut Self, &mut RBuffer, &str) -> Result<Vec<T>>,
    ) -> Result<Vec<T>> {
        let (_, arr_end) = r.read_version()?;
        let arr_end = arr_end
            .ok_or_else(|| RootError::Deserialization("TObjArray without byte count".into()))?;
        r.read_tobject()?;
        let _name = r.read_string()?;
        let count = r.read_i32()?;
        let _low = r.read_i32()?;

        let mut out = Vec::new();
        for _ in 0..count.max(0) {
            if let ObjHeader::Object { class_name, end } = self.read_object_header(r)? {
                let class_name = class_name.unwrap_or_default();
                match element(self, r, &class_name) {
                    Ok(items) => out.extend(items),
                    Err(e) => log::debug!("skipping {class_name} element: {e}"),
                }
                r.set_pos(end);
            }
        }
        r.set_pos(arr_end);
        Ok(out)
    }

    fn read_tree(&mut self, r: &mut RBuffer) -> Result<Tree> {
        let (version, tree_end) = r.read_version()?;
        let tree_end =
            tree_end.ok_or_else(|| RootError::Deserialization("TTree without byte count".into()))?;
        let (name, _title) = r.read_tnamed()?;
        for _ in 0..3 {
            r.skip_versioned()?; // TAttLine, TAttFill, TAttMarker
        }

        let entries = r.read_i64()?.max(0) as u64;
        r.skip(8 * 3)?; // fTotBytes, fZipBytes, fSavedBytes
        if version >= 18 {
            r.skip(8)?; // fFlushedBytes
        }
        r.skip(8 + 4 * 3)?; // fWeight, fTimerInterval, fScanField, fUpdate
        if version >= 18 {
            r.skip(4)?; // fDefaultEntryOffsetLen
        }
        let n_cluster_range = if version >= 19 { r.read_i32()?.max(0) as usize } else { 0 };
        r.skip(8 * 4)?; // fMaxEntries, fMaxEntryLoop, fMaxVirtualSize, fAutoSave
        if version >= 18 {
            r.skip(8)?; // fAutoFlush
        }
        r.skip(8)?; // fEstimate
        if version >= 19 {
            // fClusterRangeEnd, fClusterSize
            for _ in 0..2 {
                r.read_u8()?;
                r.skip(8 * n_cluster_range)?;
            }
        }
        if version >= 20 {
            r.skip_versioned()?; // fIOBits
        }

        let branches = self.read_obj_array(r, |ctx, r, class_name| ctx.read_branch(r, class_name))?;
        r.set_pos(tree_end);
        log::debug!("tree '{name}': {entries} entries, {} branches", branches.len());
        Ok(Tree { name, entries, branches })
    }

    /// Decode one branch element; returns it followed by its sub-branches.
    fn read_branch(&mut self, r: &mut RBuffer, class_name: &str) -> Result<Vec<BranchInfo>> {
        if matches!(class_name, "TBranchElement" | "TBranchObject") {
            r.read_version()?;
        }
        let (version, branch_end) = r.read_version()?;
        let branch_end = branch_end
            .ok_or_else(|| RootError::Deserialization("TBranch without byte count".into()))?;
        let (name, _title) = r.read_tnamed()?;
        r.skip_versioned()?; // TAttFill

        let _compress = r.read_i32()?;
        let _basket_size = r.read_i32()?;
        let entry_offset_len = r.read_i32()?;
        let write_basket = r.read_i32()?.max(0) as usize;
        let _entry_number = r.read_i64()?;
        if version >= 13 {
            r.skip_versioned()?; // fIOFeatures
        }
        let _offset = r.read_i32()?;
        let max_baskets = r.read_i32()?.max(0) as usize;
        let _split_level = r.read_i32()?;
        let entries = r.read_i64()?.max(0) as u64;
        if version >= 11 {
            let _first_entry = r.read_i64()?;
        }
        let _tot_bytes = r.read_i64()?;
        let _zip_bytes = r.read_i64()?;

        let children = self.read_obj_array(r, |ctx, r, cls| ctx.read_branch(r, cls))?;
        let leaves = self.read_obj_array(r, |ctx, r, cls| ctx.read_leaf(r, cls).map(|l| vec![l]))?;
        r.skip_versioned()?; // fBaskets

        let n = write_basket.min(max_baskets);
        r.read_u8()?;
        r.skip(4 * max_baskets)?; // fBasketBytes
        r.read_u8()?;
        let basket_entry = (0..max_baskets)
            .map(|_| r.read_i64())
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .take(n + 1)
            .map(|e| e.max(0) as u64)
            .collect();
        r.read_u8()?;
        let basket_seek = (0..max_baskets)
            .map(|_| r.read_i64())
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .take(n)
            .map(|s| s.max(0) as u64)
            .collect();
        r.set_pos(branch_end);

        let (leaf_type, leaf_title) = leaves
            .into_iter()
            .next()
            .map(|l| (l.leaf_type, l.title))
            .unwrap_or_default();
        let mut out = vec![BranchInfo {
            name,
            leaf_type,
            leaf_title,
            entry_offset_len,
            entries,
            basket_entry,
            basket_seek,
        }];
        out.extend(children);
        Ok(out)
    }

    fn read_leaf(&mut self, r: &mut RBuffer, class_name: &str) -> Result<Leaf> {
        r.read_version()?; // TLeafX
        r.read_version()?; // TLeaf
        let (_name, title) = r.read_tnamed()?;
        let _len = r.read_i32()?;
        let _len_type = r.read_i32()?;
        let _offset = r.read_i32()?;
        let _is_range = r.read_u8()?;
        let unsigned = r.read_u8()? != 0;
        // fLeafCount; streamed inline the first time the count leaf is seen.
        if let ObjHeader::Object { end, .. } = self.read_object_header(r)? {
            r.set_pos(end);
        }
        Ok(Leaf { leaf_type: LeafType::from_class(class_name, unsigned), title })
    }
}

#[cfg(any(test, feature = "testutil"))]
pub(crate) mod writer {
    //! Minimal streamer writer for synthetic trees.

    use std::collections::HashMap;

    use super::{CLASS_MASK, MAP_OFFSET, NEW_CLASS_TAG};
    use crate::rbuffer::BYTE_COUNT_MASK;

    pub struct BranchSpec<'a> {
        pub name: &'a str,
        pub leaf_class: &'a str,
        pub leaf_title: &'a str,
        pub unsigned: bool,
        pub entry_offset_len: i32,
        pub entries: i64,
        /// (first entry, seek) of each basket
        pub baskets: Vec<(i64, i64)>,
    }

    pub struct Writer {
        pub buf: Vec<u8>,
        key_len: usize,
        classes: HashMap<String, u32>,
    }

    impl Writer {
        pub fn new(key_len: usize) -> Self {
            Self { buf: Vec::new(), key_len, classes: HashMap::new() }
        }

        fn u8(&mut self, v: u8) {
            self.buf.push(v);
        }
        fn u16(&mut self, v: u16) {
            self.buf.extend_from_slice(&v.to_be_bytes());
        }
        fn i32(&mut self, v: i32) {
            self.buf.extend_from_slice(&v.to_be_bytes());
        }
        fn u32(&mut self, v: u32) {
            self.buf.extend_from_slice(&v.to_be_bytes());
        }
        fn i64(&mut self, v: i64) {
            self.buf.extend_from_slice(&v.to_be_bytes());
        }
        fn string(&mut self, s: &str) {
            self.u8(s.len() as u8);
            self.buf.extend_from_slice(s.as_bytes());
        }

        fn patch_count(&mut self, beg: usize) {
            let count = (self.buf.len() - beg - 4) as u32 | BYTE_COUNT_MASK;
            self.buf[beg..beg + 4].copy_from_slice(&count.to_be_bytes());
        }

        fn versioned(&mut self, version: u16, body: impl FnOnce(&mut Self)) {
            let beg = self.buf.len();
            self.u32(0);
            self.u16(version);
            body(self);
            self.patch_count(beg);
        }

        fn tobject(&mut self) {
            self.u16(1);
            self.u32(0);
            self.u32(0x0300_0000);
        }

        fn tnamed(&mut self, name: &str, title: &str) {
            self.versioned(1, |w| {
                w.tobject();
                w.string(name);
                w.string(title);
            });
        }

        fn object(&mut self, class_name: &str, body: impl FnOnce(&mut Self)) {
            let beg = self.buf.len();
            self.u32(0);
            let tag_pos = self.buf.len();
            match self.classes.get(class_name) {
                Some(&slot) => self.u32(slot | CLASS_MASK),
                None => {
                    self.u32(NEW_CLASS_TAG);
                    self.buf.extend_from_slice(class_name.as_bytes());
                    self.u8(0);
                    let slot = (tag_pos + self.key_len + MAP_OFFSET) as u32;
                    self.classes.insert(class_name.to_string(), slot);
                }
            }
            body(self);
            self.patch_count(beg);
        }

        fn obj_array(&mut self, n: i32, elems: impl FnOnce(&mut Self)) {
            self.versioned(3, |w| {
                w.tobject();
                w.string("");
                w.i32(n);
                w.i32(0);
                elems(w);
            });
        }

        fn leaf(&mut self, spec: &BranchSpec) {
            self.object(spec.leaf_class, |w| {
                w.versioned(1, |w| {
                    w.versioned(2, |w| {
                        w.tnamed(spec.name, spec.leaf_title);
                        w.i32(1);
                        w.i32(4);
                        w.i32(0);
                        w.u8(0);
                        w.u8(u8::from(spec.unsigned));
                        w.u32(0);
                    });
                    w.i32(0);
                    w.i32(0);
                });
            });
        }

        fn branch(&mut self, spec: &BranchSpec) {
            self.object("TBranch", |w| {
                w.versioned(13, |w| {
                    w.tnamed(spec.name, spec.leaf_title);
                    w.versioned(2, |w| w.u16(0));
                    w.i32(101);
                    w.i32(32000);
                    w.i32(spec.entry_offset_len);
                    w.i32(spec.baskets.len() as i32);
                    w.i64(spec.entries);
                    w.versioned(1, |w| w.u8(0));
                    w.i32(0);
                    let max = spec.baskets.len() as i32 + 1;
                    w.i32(max);
                    w.i32(99);
                    w.i64(spec.entries);
                    w.i64(0);
                    w.i64(0);
                    w.i64(0);
                    w.obj_array(0, |_| {});
                    w.obj_array(1, |w| w.leaf(spec));
                    w.obj_array(0, |_| {});
                    w.u8(1);
                    for _ in 0..max {
                        w.i32(0);
                    }
                    w.u8(1);
                    for &(first, _) in &spec.baskets {
                        w.i64(first);
                    }
                    w.i64(spec.entries);
                    w.u8(1);
                    for &(_, seek) in &spec.baskets {
                        w.i64(seek);
                    }
                    w.i64(0);
                });
            });
        }

        /// Stream a version-20 `TTree` holding `branches`.
        pub fn tree(&mut self, name: &str, entries: i64, branches: &[BranchSpec]) {
            self.versioned(20, |w| {
                w.tnamed(name, "");
                for _ in 0..3 {
                    w.versioned(2, |w| w.u16(0));
                }
                for _ in 0..5 {
                    w.i64(entries);
                }
                w.buf.extend_from_slice(&1.0f64.to_be_bytes());
                for _ in 0..4 {
                    w.i32(0);
                }
                w.i32(0); // fNClusterRange
                for _ in 0..6 {
                    w.i64(0);
                }
                w.u8(0);
                w.u8(0);
                w.versioned(1, |w| w.u8(0));
                w.obj_array(branches.len() as i32, |w| {
                    for b in branches {
                        w.branch(b);
                    }
                });
            });
        }
    }
}
