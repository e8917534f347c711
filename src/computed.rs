// Computed values - expressions evaluated against a single document
//
// Used by aggregation stages for group keys, accumulator inputs and derived
// projection fields, e.g. rounding an average price to two decimals.

use crate::error::{Result, TomeError};
use crate::query::validate_field_path;
use crate::types::{Document, Value};
use serde::{Deserialize, Serialize};

/// Computation expression for a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Value of a (dotted) field path, null when missing
    #[serde(rename = "$field")]
    Field(String),
    /// Constant value
    #[serde(rename = "$literal")]
    Literal(Value),
    /// Round a number to the given decimal places, ties to even
    #[serde(rename = "$round")]
    Round(Box<Expression>, i32),
    /// Sum numeric operands
    #[serde(rename = "$add")]
    Add(Vec<Expression>),
    /// Multiply numeric operands
    #[serde(rename = "$multiply")]
    Multiply(Vec<Expression>),
    /// Concatenate string operands
    #[serde(rename = "$concat")]
    Concat(Vec<Expression>),
}

impl Expression {
    pub fn field(path: impl Into<String>) -> Self {
        Expression::Field(path.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn round(inner: Expression, places: i32) -> Self {
        Expression::Round(Box::new(inner), places)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Expression::Field(path) => validate_field_path(path),
            Expression::Literal(_) => Ok(()),
            Expression::Round(inner, places) => {
                if !(-20..=100).contains(places) {
                    return Err(TomeError::Validation(format!(
                        "round places must be within -20..=100, got {}",
                        places
                    )));
                }
                inner.validate()
            }
            Expression::Add(items) | Expression::Multiply(items) | Expression::Concat(items) => {
                items.iter().try_for_each(Expression::validate)
            }
        }
    }

    /// Evaluate the expression against a document
    pub fn evaluate(&self, doc: &Document) -> Value {
        match self {
            Expression::Field(path) => doc.get_path(path).cloned().unwrap_or(Value::Null),

            Expression::Literal(value) => value.clone(),

            Expression::Round(inner, places) => match inner.evaluate(doc) {
                Value::Int(i) if *places >= 0 => Value::Int(i),
                v @ (Value::Int(_) | Value::Float(_)) => {
                    let rounded = round_half_even(v.as_f64().unwrap_or_default(), *places);
                    match v {
                        Value::Int(_) => Value::Int(rounded as i64),
                        _ => Value::Float(rounded),
                    }
                }
                _ => Value::Null,
            },

            Expression::Add(items) => {
                let mut int_sum = 0i64;
                let mut float_sum = 0.0;
                let mut is_float = false;
                for value in items.iter().map(|e| e.evaluate(doc)) {
                    match value {
                        Value::Int(i) => match int_sum.checked_add(i) {
                            Some(s) => int_sum = s,
                            None => {
                                is_float = true;
                                float_sum += i as f64;
                            }
                        },
                        Value::Float(f) => {
                            is_float = true;
                            float_sum += f;
                        }
                        _ => return Value::Null,
                    }
                }
                if is_float {
                    Value::Float(float_sum + int_sum as f64)
                } else {
                    Value::Int(int_sum)
                }
            }

            Expression::Multiply(items) => {
                let values: Vec<Value> = items.iter().map(|e| e.evaluate(doc)).collect();
                if !values.iter().all(Value::is_number) {
                    return Value::Null;
                }
                let ints: Option<i64> = values
                    .iter()
                    .try_fold(1i64, |acc, v| v.as_i64().and_then(|i| acc.checked_mul(i)));
                match ints {
                    Some(product) => Value::Int(product),
                    None => Value::Float(
                        values.iter().filter_map(Value::as_f64).product(),
                    ),
                }
            }

            Expression::Concat(items) => {
                let mut result = String::new();
                for value in items.iter().map(|e| e.evaluate(doc)) {
                    match value {
                        Value::String(s) => result.push_str(&s),
                        _ => return Value::Null,
                    }
                }
                Value::String(result)
            }
        }
    }
}

fn round_half_even(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    let rounded = (value * factor).round_ties_even() / factor;
    if rounded.is_finite() { rounded } else { value }
}
