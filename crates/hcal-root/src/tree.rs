//! Branch and tree metadata.

/// Element type of a branch's leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafType {
    /// `TLeafF`
    F32,
    /// `TLeafD`
    F64,
    /// `TLeafI`
    I32,
    /// `TLeafI`, unsigned
    U32,
    /// `TLeafL`
    I64,
    /// `TLeafL`, unsigned
    U64,
    /// `TLeafS`
    I16,
    /// `TLeafS`, unsigned
    U16,
    /// `TLeafB`
    I8,
    /// `TLeafB`, unsigned (`UChar_t`, used for ADC counts)
    U8,
    /// `TLeafO`
    Bool,
}

impl LeafType {
    /// Map a `TLeaf*` class name to a leaf type.
    pub fn from_class(class_name: &str, unsigned: bool) -> Option<Self> {
        Some(match (class_name, unsigned) {
            ("TLeafF", _) => Self::F32,
            ("TLeafD", _) => Self::F64,
            ("TLeafI", false) => Self::I32,
            ("TLeafI", true) => Self::U32,
            ("TLeafL", false) => Self::I64,
            ("TLeafL", true) => Self::U64,
            ("TLeafS", false) => Self::I16,
            ("TLeafS", true) => Self::U16,
            ("TLeafB", false) => Self::I8,
            ("TLeafB", true) => Self::U8,
            ("TLeafO", _) => Self::Bool,
            _ => return None,
        })
    }

    /// Size in bytes of one element.
    pub const fn byte_size(self) -> usize {
        match self {
            Self::F64 | Self::I64 | Self::U64 => 8,
            Self::F32 | Self::I32 | Self::U32 => 4,
            Self::I16 | Self::U16 => 2,
            Self::I8 | Self::U8 | Self::Bool => 1,
        }
    }

    /// Decode one big-endian element; `bytes` must hold exactly `byte_size()` bytes.
    pub fn decode_f64(self, bytes: &[u8]) -> f64 {
        let mut b = [0u8; 8];
        b[..bytes.len()].copy_from_slice(bytes);
        match self {
            Self::F32 => f64::from(f32::from_be_bytes([b[0], b[1], b[2], b[3]])),
            Self::F64 => f64::from_be_bytes(b),
            Self::I32 => f64::from(i32::from_be_bytes([b[0], b[1], b[2], b[3]])),
            Self::U32 => f64::from(u32::from_be_bytes([b[0], b[1], b[2], b[3]])),
            Self::I64 => i64::from_be_bytes(b) as f64,
            Self::U64 => u64::from_be_bytes(b) as f64,
            Self::I16 => f64::from(i16::from_be_bytes([b[0], b[1]])),
            Self::U16 => f64::from(u16::from_be_bytes([b[0], b[1]])),
            Self::I8 => f64::from(b[0] as i8),
            Self::U8 => f64::from(b[0]),
            Self::Bool => f64::from(u8::from(b[0] != 0)),
        }
    }

    /// Decode one big-endian element as an unsigned integer. `None` for negative values
    /// and for floating-point values that are not whole numbers.
    pub fn decode_u64(self, bytes: &[u8]) -> Option<u64> {
        let mut b = [0u8; 8];
        b[..bytes.len()].copy_from_slice(bytes);
        match self {
            Self::U64 => Some(u64::from_be_bytes(b)),
            Self::I64 => u64::try_from(i64::from_be_bytes(b)).ok(),
            Self::U32 => Some(u64::from(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))),
            Self::I32 => u64::try_from(i32::from_be_bytes([b[0], b[1], b[2], b[3]])).ok(),
            Self::U16 => Some(u64::from(u16::from_be_bytes([b[0], b[1]]))),
            Self::I16 => u64::try_from(i16::from_be_bytes([b[0], b[1]])).ok(),
            Self::U8 | Self::Bool => Some(u64::from(b[0])),
            Self::I8 => u64::try_from(b[0] as i8).ok(),
            Self::F32 | Self::F64 => {
                let x = self.decode_f64(bytes);
                (x >= 0.0 && x.fract() == 0.0 && x < u64::MAX as f64).then_some(x as u64)
            }
        }
    }
}

/// Metadata for one `TBranch`.
#[derive(Debug, Clone)]
pub struct BranchInfo {
    pub name: String,
    /// Element type of the first leaf; `None` when the leaf class is not a plain `TLeaf*`.
    pub leaf_type: Option<LeafType>,
    /// Title of the first leaf, e.g. `DigiHB_fc0[nDigiHB]/F`.
    pub leaf_title: String,
    /// Non-zero when entries have variable size and baskets carry offset tables.
    pub entry_offset_len: i32,
    pub entries: u64,
    /// First entry of each written basket, plus the end entry.
    pub basket_entry: Vec<u64>,
    /// File offset of each written basket.
    pub basket_seek: Vec<u64>,
}

impl BranchInfo {
    /// Whether entries are variable-length arrays (counted by another branch).
    pub fn is_jagged(&self) -> bool {
        self.entry_offset_len > 0 || self.leaf_title.contains('[')
    }

    /// Number of written baskets.
    pub fn n_baskets(&self) -> usize {
        self.basket_seek.len()
    }

    /// Entry span `[first, end)` of basket `i`.
    pub fn basket_span(&self, i: usize) -> (u64, u64) {
        let first = self.basket_entry.get(i).copied().unwrap_or(0);
        let end = self.basket_entry.get(i + 1).copied().unwrap_or(self.entries);
        (first, end.max(first))
    }
}

/// A `TTree` with its flattened branch list.
#[derive(Debug, Clone)]
pub struct Tree {
    pub name: String,
    pub entries: u64,
    pub branches: Vec<BranchInfo>,
}

impl Tree {
    pub fn find_branch(&self, name: &str) -> Option<&BranchInfo> {
        self.branches.iter().find(|b| b.name == name)
    }

    pub fn has_branch(&self, name: &str) -> bool {
        self.find_branch(name).is_some()
    }

    pub fn branch_names(&self) -> impl Iterator<Item = &str> {
        self.branches.iter().map(|b| b.name.as_str())
    }
}
