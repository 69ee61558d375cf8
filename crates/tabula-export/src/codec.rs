use tabula_model::{ColumnDef, ColumnType, ConfigTable, Row, Value};

use crate::error::{DecodeError, EncodeError};

static NULL: Value = Value::Null;

/// Serialize a table's rows into the typed plaintext layout: a `u32` row
/// count, then per row, per column in schema order, a presence flag byte
/// followed by the typed encoding.
pub fn encode_rows(table: &ConfigTable) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(table.rows.len() as u32).to_le_bytes());
    for row in &table.rows {
        for col in &table.columns {
            let value = row.get(&col.name).unwrap_or(&NULL);
            write_value(&mut buf, value, &col.ty, &col.name)?;
        }
    }
    Ok(buf)
}

/// Decode the typed plaintext layout back into rows, guided by the same
/// column definitions that produced it.
///
/// This is the byte-compatibility contract for generated runtime readers:
/// whatever this function accepts, a reader generated from the same schema
/// must accept too.
pub fn decode_rows(bytes: &[u8], columns: &[ColumnDef]) -> Result<Vec<Row>, DecodeError> {
    let mut reader = ByteReader::new(bytes);
    let count = reader.read_u32()?;
    let mut rows = Vec::new();
    for _ in 0..count {
        let mut row = Row::new();
        for col in columns {
            row.insert(col.name.clone(), read_value(&mut reader, &col.ty)?);
        }
        rows.push(row);
    }
    match reader.remaining() {
        0 => Ok(rows),
        extra => Err(DecodeError::TrailingBytes(extra)),
    }
}

fn write_value(
    buf: &mut Vec<u8>,
    value: &Value,
    ty: &ColumnType,
    column: &str,
) -> Result<(), EncodeError> {
    if value.is_null() {
        buf.push(0);
        return Ok(());
    }
    buf.push(1);
    match ty {
        ColumnType::Int => {
            let wide = value
                .as_i64()
                .ok_or_else(|| mismatch(column, value, ty))?;
            let narrow = i32::try_from(wide).map_err(|_| EncodeError::IntOutOfRange {
                column: column.to_string(),
                value: wide,
            })?;
            buf.extend_from_slice(&narrow.to_le_bytes());
        }
        ColumnType::Float => {
            let v = value.as_f64().ok_or_else(|| mismatch(column, value, ty))? as f32;
            buf.extend_from_slice(&v.to_le_bytes());
        }
        ColumnType::Bool => {
            let v = value.as_bool().ok_or_else(|| mismatch(column, value, ty))?;
            buf.push(v as u8);
        }
        ColumnType::String => write_string(buf, &value.to_string()),
        ColumnType::List(elem) => match value {
            Value::List(items) => {
                buf.extend_from_slice(&(items.len() as u32).to_le_bytes());
                for item in items {
                    write_value(buf, item, elem, column)?;
                }
            }
            // Coercion wraps stray scalars in a single-element list; mirror
            // that for values that bypassed it.
            other => {
                buf.extend_from_slice(&1u32.to_le_bytes());
                write_value(buf, other, elem, column)?;
            }
        },
        ColumnType::Map(key_ty, value_ty) => match value {
            Value::Map(pairs) => {
                buf.extend_from_slice(&(pairs.len() as u32).to_le_bytes());
                for (key, value) in pairs {
                    write_value(buf, key, key_ty, column)?;
                    write_value(buf, value, value_ty, column)?;
                }
            }
            _ => buf.extend_from_slice(&0u32.to_le_bytes()),
        },
    }
    Ok(())
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn mismatch(column: &str, value: &Value, ty: &ColumnType) -> EncodeError {
    EncodeError::ValueMismatch {
        column: column.to_string(),
        value: value.to_string(),
        ty: ty.clone(),
    }
}

fn read_value(reader: &mut ByteReader<'_>, ty: &ColumnType) -> Result<Value, DecodeError> {
    match reader.read_u8()? {
        0 => return Ok(Value::Null),
        1 => {}
        flag => {
            return Err(DecodeError::BadFlag {
                flag,
                offset: reader.pos - 1,
            })
        }
    }
    Ok(match ty {
        ColumnType::Int => Value::Int(reader.read_i32()? as i64),
        ColumnType::Float => Value::Float(reader.read_f32()? as f64),
        ColumnType::Bool => Value::Bool(reader.read_u8()? != 0),
        ColumnType::String => {
            let len = reader.read_u32()? as usize;
            Value::Text(String::from_utf8(reader.read_slice(len)?.to_vec())?)
        }
        ColumnType::List(elem) => {
            let count = reader.read_u32()?;
            let mut items = Vec::new();
            for _ in 0..count {
                items.push(read_value(reader, elem)?);
            }
            Value::List(items)
        }
        ColumnType::Map(key_ty, value_ty) => {
            let count = reader.read_u32()?;
            let mut pairs = Vec::new();
            for _ in 0..count {
                let key = read_value(reader, key_ty)?;
                let value = read_value(reader, value_ty)?;
                pairs.push((key, value));
            }
            Value::Map(pairs)
        }
    })
}

/// Little-endian cursor over the plaintext row data.
struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(DecodeError::Truncated { offset: self.pos })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_slice(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.read_slice(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        let bytes = self.read_slice(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_f32(&mut self) -> Result<f32, DecodeError> {
        let bytes = self.read_slice(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use tabula_model::{ConfigTable, KeyScope};

    use super::*;

    fn one_column_table(ty: &str, value: serde_json::Value) -> ConfigTable {
        let mut table = ConfigTable::new(
            "t",
            "g",
            KeyScope::Group,
            vec![
                ColumnDef::new("id", ColumnType::Int),
                ColumnDef::new("v", ty.parse().expect("type")),
            ],
        );
        table
            .add_row(
                serde_json::json!({"id": 1, "v": value})
                    .as_object()
                    .expect("object"),
            )
            .expect("row");
        table
    }

    #[test]
    fn empty_table_is_just_a_zero_count() {
        let table = ConfigTable::new(
            "t",
            "g",
            KeyScope::Group,
            vec![ColumnDef::new("id", ColumnType::Int)],
        );
        assert_eq!(encode_rows(&table).expect("encode"), vec![0, 0, 0, 0]);
    }

    #[test]
    fn int_encoding_is_little_endian_i32() {
        let table = one_column_table("int", serde_json::json!(258));
        let bytes = encode_rows(&table).expect("encode");
        // count=1, id: flag+1i32, v: flag+258i32
        assert_eq!(
            bytes,
            vec![1, 0, 0, 0, 1, 1, 0, 0, 0, 1, 2, 1, 0, 0]
        );
    }

    #[test]
    fn string_encoding_is_length_prefixed_utf8() {
        let table = one_column_table("string", serde_json::json!("héllo"));
        let bytes = encode_rows(&table).expect("encode");
        let tail = &bytes[9..];
        assert_eq!(tail[0], 1);
        assert_eq!(&tail[1..5], &(6u32.to_le_bytes())[..]);
        assert_eq!(&tail[5..], "héllo".as_bytes());
    }

    #[test]
    fn out_of_range_int_is_an_error_not_a_panic() {
        let table = one_column_table("int", serde_json::json!(i64::from(i32::MAX) + 1));
        let err = encode_rows(&table).expect_err("overflow");
        assert!(matches!(err, EncodeError::IntOutOfRange { .. }));
    }

    #[test]
    fn bad_presence_flag_is_rejected() {
        let columns = vec![ColumnDef::new("id", ColumnType::Int)];
        let err = decode_rows(&[1, 0, 0, 0, 7], &columns).expect_err("bad flag");
        assert!(matches!(err, DecodeError::BadFlag { flag: 7, .. }));
    }

    #[test]
    fn truncated_row_data_is_rejected() {
        let columns = vec![ColumnDef::new("id", ColumnType::Int)];
        let err = decode_rows(&[1, 0, 0, 0, 1, 5, 0], &columns).expect_err("truncated");
        assert!(matches!(err, DecodeError::Truncated { .. }));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let columns = vec![ColumnDef::new("id", ColumnType::Int)];
        let err =
            decode_rows(&[1, 0, 0, 0, 1, 5, 0, 0, 0, 0xFF], &columns).expect_err("trailing");
        assert!(matches!(err, DecodeError::TrailingBytes(1)));
    }
}
