//! Result-row accessors.

use crate::error::TranslateResult;
use crate::expr::ExprType;
use crate::sql::SqlValue;
use serde::{Deserialize, Serialize};

/// How to read one value out of a positional result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResultAccessor {
    Column {
        index: usize,
        ty: ExprType,
    },
    Object {
        type_name: Option<String>,
        members: Vec<(String, ResultAccessor)>,
    },
    /// Client-side value that never reaches the server
    Value(SqlValue),
}

/// Value tree produced by [`ResultAccessor::read`]
#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    Scalar(SqlValue),
    Object {
        type_name: Option<String>,
        fields: Vec<(String, ResultValue)>,
    },
}

impl ResultAccessor {
    /// Read a row; `None` when the row is shorter than an index
    pub fn read(&self, row: &[SqlValue]) -> Option<ResultValue> {
        match self {
            ResultAccessor::Column { index, .. } => row.get(*index).cloned().map(ResultValue::Scalar),
            ResultAccessor::Value(v) => Some(ResultValue::Scalar(v.clone())),
            ResultAccessor::Object { type_name, members } => {
                let fields = members
                    .iter()
                    .map(|(name, m)| m.read(row).map(|v| (name.clone(), v)))
                    .collect::<Option<Vec<_>>>()?;
                Some(ResultValue::Object {
                    type_name: type_name.clone(),
                    fields,
                })
            }
        }
    }

    /// Column indices in member order
    pub fn indices(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_indices(&mut out);
        out
    }

    fn collect_indices(&self, out: &mut Vec<usize>) {
        match self {
            ResultAccessor::Column { index, .. } => out.push(*index),
            ResultAccessor::Object { members, .. } => {
                members.iter().for_each(|(_, m)| m.collect_indices(out))
            }
            ResultAccessor::Value(_) => {}
        }
    }

    pub fn try_map_indices(
        self,
        f: &mut dyn FnMut(usize) -> TranslateResult<usize>,
    ) -> TranslateResult<Self> {
        Ok(match self {
            ResultAccessor::Column { index, ty } => ResultAccessor::Column {
                index: f(index)?,
                ty,
            },
            ResultAccessor::Object { type_name, members } => ResultAccessor::Object {
                type_name,
                members: members
                    .into_iter()
                    .map(|(name, m)| Ok((name, m.try_map_indices(f)?)))
                    .collect::<TranslateResult<Vec<_>>>()?,
            },
            value => value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> ResultAccessor {
        ResultAccessor::Object {
            type_name: Some("Person".to_string()),
            members: vec![
                (
                    "id".to_string(),
                    ResultAccessor::Column {
                        index: 1,
                        ty: ExprType::Int,
                    },
                ),
                ("source".to_string(), ResultAccessor::Value("db".into())),
            ],
        }
    }

    #[test]
    fn test_read_object() {
        let row = vec![SqlValue::Text("x".into()), SqlValue::Int(7)];
        let value = person().read(&row).unwrap();

        assert_eq!(
            value,
            ResultValue::Object {
                type_name: Some("Person".to_string()),
                fields: vec![
                    ("id".to_string(), ResultValue::Scalar(SqlValue::Int(7))),
                    ("source".to_string(), ResultValue::Scalar("db".into())),
                ],
            }
        );
    }

    #[test]
    fn test_read_short_row() {
        assert!(person().read(&[SqlValue::Null]).is_none());
    }

    #[test]
    fn test_map_indices() {
        let mapped = person().try_map_indices(&mut |i| Ok(i + 10)).unwrap();
        assert_eq!(mapped.indices(), vec![11]);
    }
}
