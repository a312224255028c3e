//! Write sets: an ordered list of puts and deletes committed atomically.

use serde::Serialize;

use crate::{codec, StoreError, Table};

/// One mutation inside a [`WriteSet`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    Put {
        table: Table,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        table: Table,
        key: Vec<u8>,
    },
}

/// A group of mutations applied all-or-nothing by [`crate::KvStore::commit`].
///
/// Operations apply in insertion order, so a later put of the same key wins.
#[derive(Clone, Debug, Default)]
pub struct WriteSet {
    ops: Vec<WriteOp>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, table: Table, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(WriteOp::Put {
            table,
            key: key.into(),
            value: value.into(),
        });
    }

    /// Encode `value` and queue a put.
    pub fn put_value<T: Serialize>(
        &mut self,
        table: Table,
        key: impl Into<Vec<u8>>,
        value: &T,
    ) -> Result<(), StoreError> {
        let bytes = codec::encode(value)?;
        self.put(table, key, bytes);
        Ok(())
    }

    pub fn delete(&mut self, table: Table, key: impl Into<Vec<u8>>) {
        self.ops.push(WriteOp::Delete {
            table,
            key: key.into(),
        });
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ops_keep_insertion_order() {
        let mut set = WriteSet::new();
        set.put(Table::Blocks, b"a".to_vec(), b"1".to_vec());
        set.delete(Table::Blocks, b"a".to_vec());
        assert_eq!(set.len(), 2);
        assert!(matches!(set.ops()[0], WriteOp::Put { .. }));
        assert!(matches!(set.ops()[1], WriteOp::Delete { .. }));
    }

    #[test]
    fn put_value_encodes_with_bincode() {
        let mut set = WriteSet::new();
        set.put_value(Table::Meta, b"n".to_vec(), &42u32).unwrap();
        match &set.ops()[0] {
            WriteOp::Put { value, .. } => assert_eq!(codec::decode::<u32>(value).unwrap(), 42),
            other => panic!("unexpected op {other:?}"),
        }
    }
}
