//! Block model: a contiguous row group with typed per-column encodings,
//! plus the encoder that picks the tightest value type for raw columns.

use logsql_result::{Error, Result};

use crate::value::{
    decode_be_uint, format_float, format_ipv4, format_timestamp_iso8601, try_parse_ipv4,
    try_parse_timestamp_iso8601, try_parse_uint64, ValueType,
};

/// Tenant owning a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TenantId {
    pub account_id: u32,
    pub project_id: u32,
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.account_id, self.project_id)
    }
}

/// Name/value pair used for stream labels and const columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: String,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            value: value.into(),
        }
    }
}

pub type ConstColumn = Field;

/// Per-block, per-column metadata.
///
/// `min_value`/`max_value` hold the numeric coding of the smallest and
/// largest stored value; the interpretation depends on `value_type`
/// (integer value, float bits, ipv4 address, timestamp nanoseconds).
#[derive(Clone, Debug)]
pub struct ColumnHeader {
    pub name: String,
    pub value_type: ValueType,
    pub min_value: u64,
    pub max_value: u64,
    /// Ordered distinct values for dict columns; every encoded byte indexes
    /// into this list.
    pub values_dict: Vec<String>,
}

/// One typed column: header plus the encoded cell per row.
#[derive(Clone, Debug)]
pub struct Column {
    pub header: ColumnHeader,
    pub values: Vec<Vec<u8>>,
}

impl Column {
    #[inline]
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// Encoded cell for one row.
    #[inline]
    pub fn cell(&self, row: usize) -> &[u8] {
        &self.values[row]
    }

    /// Validate the cell width for fixed-width types and decode it into the
    /// type's numeric coding.
    pub fn decode_numeric(&self, row: usize, part: &str) -> Result<u64> {
        let cell = self.cell(row);
        match self.header.value_type.cell_width() {
            Some(w) if cell.len() == w => Ok(decode_be_uint(cell)),
            Some(w) => Err(Error::corrupt_block(
                part,
                format!(
                    "column {:?}: cell of {} bytes where {w} expected",
                    self.header.name,
                    cell.len()
                ),
            )),
            None => Err(Error::Internal(format!(
                "column {:?} has no fixed-width encoding",
                self.header.name
            ))),
        }
    }

    /// Decode the dict index for one row, validated against the dictionary.
    pub fn dict_index(&self, row: usize, part: &str) -> Result<u8> {
        let cell = self.cell(row);
        if cell.len() != 1 {
            return Err(Error::corrupt_block(
                part,
                format!(
                    "column {:?}: dict cell of {} bytes",
                    self.header.name,
                    cell.len()
                ),
            ));
        }
        let idx = cell[0];
        if usize::from(idx) >= self.header.values_dict.len() {
            return Err(Error::corrupt_block(
                part,
                format!(
                    "column {:?}: dict index {idx} out of range ({} entries)",
                    self.header.name,
                    self.header.values_dict.len()
                ),
            ));
        }
        Ok(idx)
    }

    /// String cell for one row. Only valid for `ValueType::String` columns.
    pub fn str_cell(&self, row: usize, part: &str) -> Result<&str> {
        std::str::from_utf8(self.cell(row))
            .map_err(|_| Error::corrupt_block(part, format!("column {:?}: non-UTF-8 cell", self.header.name)))
    }

    /// Render one row to its canonical string form.
    pub fn render(&self, row: usize, part: &str) -> Result<String> {
        match self.header.value_type {
            ValueType::String => Ok(self.str_cell(row, part)?.to_string()),
            ValueType::Dict => {
                let idx = self.dict_index(row, part)?;
                Ok(self.header.values_dict[usize::from(idx)].clone())
            }
            ValueType::Uint8 | ValueType::Uint16 | ValueType::Uint32 | ValueType::Uint64 => {
                Ok(self.decode_numeric(row, part)?.to_string())
            }
            ValueType::Float64 => Ok(format_float(f64::from_bits(self.decode_numeric(row, part)?))),
            ValueType::Ipv4 => Ok(format_ipv4(self.decode_numeric(row, part)? as u32)),
            ValueType::TimestampIso8601 => {
                Ok(format_timestamp_iso8601(self.decode_numeric(row, part)? as i64))
            }
        }
    }
}

/// A contiguous row group with typed per-column encodings. All state is
/// read-only during query evaluation.
#[derive(Clone, Debug, Default)]
pub struct Block {
    /// Identifier used in corruption reports.
    pub part: String,
    pub tenant: TenantId,
    /// Row timestamps, unix nanoseconds, ascending.
    pub timestamps: Vec<i64>,
    pub columns: Vec<Column>,
    /// Columns whose value is identical for every row, stored once.
    pub const_columns: Vec<ConstColumn>,
    pub stream_labels: Vec<Field>,
}

impl Block {
    #[inline]
    pub fn row_count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.header.name == name)
    }

    /// Value of the named const column, if the block has one.
    pub fn const_column_value(&self, name: &str) -> Option<&str> {
        self.const_columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    /// Encode raw string columns into a typed block. Column value vectors
    /// must match the timestamp count; columns whose every value is empty
    /// are dropped (an absent column reads as empty strings).
    pub fn build(
        part: impl Into<String>,
        tenant: TenantId,
        timestamps: Vec<i64>,
        raw_columns: Vec<(String, Vec<String>)>,
        stream_labels: Vec<Field>,
    ) -> Result<Block> {
        let part = part.into();
        let rows = timestamps.len();
        let mut columns = Vec::new();
        let mut const_columns = Vec::new();
        for (name, values) in raw_columns {
            if values.len() != rows {
                return Err(Error::Internal(format!(
                    "column {name:?} has {} values for {rows} rows",
                    values.len()
                )));
            }
            match encode_column(name, values) {
                Encoded::Absent => {}
                Encoded::Const(c) => const_columns.push(c),
                Encoded::Column(c) => columns.push(c),
            }
        }
        Ok(Block {
            part,
            tenant,
            timestamps,
            columns,
            const_columns,
            stream_labels,
        })
    }
}

enum Encoded {
    Absent,
    Const(ConstColumn),
    Column(Column),
}

/// Pick the tightest encoding whose canonical rendering reproduces every
/// value byte for byte.
fn encode_column(name: String, values: Vec<String>) -> Encoded {
    if values.iter().all(|v| v.is_empty()) {
        return Encoded::Absent;
    }
    if values.windows(2).all(|w| w[0] == w[1]) {
        return Encoded::Const(Field {
            name,
            value: values.into_iter().next().unwrap_or_default(),
        });
    }
    if let Some(c) = try_encode_uint(&name, &values) {
        return Encoded::Column(c);
    }
    if let Some(c) = try_encode_float(&name, &values) {
        return Encoded::Column(c);
    }
    if let Some(c) = try_encode_ipv4(&name, &values) {
        return Encoded::Column(c);
    }
    if let Some(c) = try_encode_timestamp(&name, &values) {
        return Encoded::Column(c);
    }
    if let Some(c) = try_encode_dict(&name, &values) {
        return Encoded::Column(c);
    }
    Encoded::Column(Column {
        header: ColumnHeader {
            name,
            value_type: ValueType::String,
            min_value: 0,
            max_value: 0,
            values_dict: Vec::new(),
        },
        values: values.into_iter().map(String::into_bytes).collect(),
    })
}

fn try_encode_uint(name: &str, values: &[String]) -> Option<Column> {
    let mut nums = Vec::with_capacity(values.len());
    for v in values {
        let n = try_parse_uint64(v)?;
        if n.to_string() != *v {
            return None;
        }
        nums.push(n);
    }
    let min = *nums.iter().min()?;
    let max = *nums.iter().max()?;
    let (value_type, width) = if max <= u64::from(u8::MAX) {
        (ValueType::Uint8, 1)
    } else if max <= u64::from(u16::MAX) {
        (ValueType::Uint16, 2)
    } else if max <= u64::from(u32::MAX) {
        (ValueType::Uint32, 4)
    } else {
        (ValueType::Uint64, 8)
    };
    let cells = nums
        .iter()
        .map(|n| n.to_be_bytes()[8 - width..].to_vec())
        .collect();
    Some(Column {
        header: ColumnHeader {
            name: name.to_string(),
            value_type,
            min_value: min,
            max_value: max,
            values_dict: Vec::new(),
        },
        values: cells,
    })
}

fn try_encode_float(name: &str, values: &[String]) -> Option<Column> {
    let mut nums = Vec::with_capacity(values.len());
    for v in values {
        let f: f64 = v.parse().ok()?;
        if format_float(f) != *v {
            return None;
        }
        nums.push(f);
    }
    let min = nums.iter().copied().fold(f64::INFINITY, f64::min);
    let max = nums.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(Column {
        header: ColumnHeader {
            name: name.to_string(),
            value_type: ValueType::Float64,
            min_value: min.to_bits(),
            max_value: max.to_bits(),
            values_dict: Vec::new(),
        },
        values: nums.iter().map(|f| f.to_bits().to_be_bytes().to_vec()).collect(),
    })
}

fn try_encode_ipv4(name: &str, values: &[String]) -> Option<Column> {
    let mut addrs = Vec::with_capacity(values.len());
    for v in values {
        addrs.push(try_parse_ipv4(v)?);
    }
    let min = *addrs.iter().min()?;
    let max = *addrs.iter().max()?;
    Some(Column {
        header: ColumnHeader {
            name: name.to_string(),
            value_type: ValueType::Ipv4,
            min_value: u64::from(min),
            max_value: u64::from(max),
            values_dict: Vec::new(),
        },
        values: addrs.iter().map(|a| a.to_be_bytes().to_vec()).collect(),
    })
}

fn try_encode_timestamp(name: &str, values: &[String]) -> Option<Column> {
    let mut stamps = Vec::with_capacity(values.len());
    for v in values {
        stamps.push(try_parse_timestamp_iso8601(v)?);
    }
    let min = *stamps.iter().min()?;
    let max = *stamps.iter().max()?;
    Some(Column {
        header: ColumnHeader {
            name: name.to_string(),
            value_type: ValueType::TimestampIso8601,
            min_value: min as u64,
            max_value: max as u64,
            values_dict: Vec::new(),
        },
        values: stamps.iter().map(|t| t.to_be_bytes().to_vec()).collect(),
    })
}

fn try_encode_dict(name: &str, values: &[String]) -> Option<Column> {
    let mut dict: Vec<String> = Vec::new();
    let mut cells = Vec::with_capacity(values.len());
    for v in values {
        let idx = match dict.iter().position(|d| d == v) {
            Some(idx) => idx,
            None => {
                if dict.len() == 256 {
                    return None;
                }
                dict.push(v.clone());
                dict.len() - 1
            }
        };
        cells.push(vec![idx as u8]);
    }
    Some(Column {
        header: ColumnHeader {
            name: name.to_string(),
            value_type: ValueType::Dict,
            min_value: 0,
            max_value: 0,
            values_dict: dict,
        },
        values: cells,
    })
}

/// One projected output column: canonical string values per surviving row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultColumn {
    pub name: String,
    pub values: Vec<String>,
}

/// Rows surviving the filter, projected to the columns a query needs.
/// Flows through the pipe chain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockResult {
    pub timestamps: Vec<i64>,
    pub columns: Vec<ResultColumn>,
}

impl BlockResult {
    #[inline]
    pub fn row_count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn column(&self, name: &str) -> Option<&ResultColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Value of `name` at `row`; absent columns read as the empty string.
    pub fn field_value(&self, name: &str, row: usize) -> &str {
        match self.column(name) {
            Some(c) => c.values.get(row).map(String::as_str).unwrap_or(""),
            None => "",
        }
    }

    /// Keep only the rows at the given indexes.
    pub fn take_rows(&self, rows: &[usize]) -> BlockResult {
        BlockResult {
            timestamps: rows.iter().map(|&r| self.timestamps[r]).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| ResultColumn {
                    name: c.name.clone(),
                    values: rows.iter().map(|&r| c.values[r].clone()).collect(),
                })
                .collect(),
        }
    }
}
