use crate::error::{Result, TomeError};
use crate::query::validate_field_path;
use crate::types::{Document, ID_FIELD, Value};
use serde::{Deserialize, Serialize};

/// A single field mutation. The set of kinds is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpdateOp {
    #[serde(rename = "$set")]
    Set { field: String, value: Value },
    #[serde(rename = "$unset")]
    Unset { field: String },
    #[serde(rename = "$inc")]
    Inc { field: String, amount: Value },
    #[serde(rename = "$mul")]
    Mul { field: String, factor: Value },
    #[serde(rename = "$min")]
    Min { field: String, value: Value },
    #[serde(rename = "$max")]
    Max { field: String, value: Value },
    #[serde(rename = "$rename")]
    Rename { from: String, to: String },
    #[serde(rename = "$push")]
    Push { field: String, value: Value },
}

impl UpdateOp {
    fn paths(&self) -> Vec<&str> {
        match self {
            UpdateOp::Set { field, .. }
            | UpdateOp::Unset { field }
            | UpdateOp::Inc { field, .. }
            | UpdateOp::Mul { field, .. }
            | UpdateOp::Min { field, .. }
            | UpdateOp::Max { field, .. }
            | UpdateOp::Push { field, .. } => vec![field.as_str()],
            UpdateOp::Rename { from, to } => vec![from.as_str(), to.as_str()],
        }
    }

    fn apply(&self, doc: &mut Document) -> Result<()> {
        match self {
            UpdateOp::Set { field, value } => doc.set_path(field, value.clone()),
            UpdateOp::Unset { field } => {
                doc.remove_path(field);
                Ok(())
            }
            UpdateOp::Inc { field, amount } => {
                let current = doc.get_path(field).cloned().unwrap_or(Value::Int(0));
                let next = arithmetic(field, &current, amount, i64::checked_add, |a, b| a + b)?;
                doc.set_path(field, next)
            }
            UpdateOp::Mul { field, factor } => {
                let current = doc.get_path(field).cloned().unwrap_or(Value::Int(0));
                let next = arithmetic(field, &current, factor, i64::checked_mul, |a, b| a * b)?;
                doc.set_path(field, next)
            }
            UpdateOp::Min { field, value } => match doc.get_path(field) {
                Some(current) if current <= value => Ok(()),
                _ => doc.set_path(field, value.clone()),
            },
            UpdateOp::Max { field, value } => match doc.get_path(field) {
                Some(current) if current >= value => Ok(()),
                _ => doc.set_path(field, value.clone()),
            },
            UpdateOp::Rename { from, to } => match doc.remove_path(from) {
                Some(value) => doc.set_path(to, value),
                None => Ok(()),
            },
            UpdateOp::Push { field, value } => match doc.get_path(field).cloned() {
                None => doc.set_path(field, Value::Array(vec![value.clone()])),
                Some(Value::Array(mut items)) => {
                    items.push(value.clone());
                    doc.set_path(field, Value::Array(items))
                }
                Some(other) => Err(TomeError::write(
                    format!("cannot push to '{}' of type {}", field, other.type_name()),
                    0,
                )),
            },
        }
    }
}

fn arithmetic(
    field: &str,
    current: &Value,
    operand: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    match (current, operand) {
        (Value::Int(a), Value::Int(b)) => Ok(int_op(*a, *b)
            .map(Value::Int)
            .unwrap_or_else(|| Value::Float(float_op(*a as f64, *b as f64)))),
        (a, b) if a.is_number() && b.is_number() => Ok(Value::Float(float_op(
            a.as_f64().unwrap_or_default(),
            b.as_f64().unwrap_or_default(),
        ))),
        (a, _) => Err(TomeError::write(
            format!(
                "cannot apply arithmetic to non-numeric field '{}' of type {}",
                field,
                a.type_name()
            ),
            0,
        )),
    }
}

fn paths_conflict(a: &str, b: &str) -> bool {
    a == b
        || a.strip_prefix(b).is_some_and(|rest| rest.starts_with('.'))
        || b.strip_prefix(a).is_some_and(|rest| rest.starts_with('.'))
}

/// An ordered set of mutations applied to every matched document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateSpec {
    pub ops: Vec<UpdateOp>,
}

impl UpdateSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Set {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Unset { field: field.into() });
        self
    }

    pub fn inc(mut self, field: impl Into<String>, amount: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Inc {
            field: field.into(),
            amount: amount.into(),
        });
        self
    }

    pub fn mul(mut self, field: impl Into<String>, factor: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Mul {
            field: field.into(),
            factor: factor.into(),
        });
        self
    }

    pub fn min(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Min {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn max(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Max {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Rename {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn push(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Push {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.ops.is_empty() {
            return Err(TomeError::Validation("update must contain at least one operation".into()));
        }

        let mut seen: Vec<&str> = Vec::new();
        for op in &self.ops {
            match op {
                UpdateOp::Inc { amount: n, .. } | UpdateOp::Mul { factor: n, .. }
                    if !n.is_number() =>
                {
                    return Err(TomeError::Validation(format!(
                        "arithmetic operand must be numeric, got {}",
                        n.type_name()
                    )));
                }
                _ => {}
            }

            for path in op.paths() {
                validate_field_path(path)?;
                if path == ID_FIELD || path.starts_with("_id.") {
                    return Err(TomeError::Validation("the _id field is immutable".into()));
                }
                if let Some(other) = seen.iter().find(|p| paths_conflict(p, path)) {
                    return Err(TomeError::Validation(format!(
                        "updating '{}' would conflict with '{}'",
                        path, other
                    )));
                }
                seen.push(path);
            }
        }
        Ok(())
    }

    /// Applies every mutation in order. Returns whether the document changed.
    /// On error the document is left untouched.
    pub fn apply(&self, doc: &mut Document) -> Result<bool> {
        let mut updated = doc.clone();
        for op in &self.ops {
            op.apply(&mut updated)?;
        }
        if updated == *doc {
            return Ok(false);
        }
        *doc = updated;
        Ok(true)
    }
}
