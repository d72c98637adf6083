//! Concrete constraint checks
//!
//! Each check inspects a present value and either passes it through
//! (possibly rebuilt, as the list check does) or fails. Absence, defaults
//! and required-ness are handled by [`Validator`](super::Validator) before any
//! check runs.

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Weak};

use chrono::Timelike;

use crate::errors::{describe_bounds, SchemaError, SchemaResult};
use crate::registry::{Registry, SchemaRef};
use crate::model::Model;
use crate::value::{Value, ValueKind};

use super::validator::Validator;

/// A single constraint over a present value
pub trait Constraint {
    /// Checks the value, returning it (possibly rebuilt) when it passes
    fn check(&self, value: Value) -> SchemaResult<Value>;
}

/// One entry in a validator's ordered check list
#[derive(Debug, Clone)]
pub enum Check {
    Type(TypeValidator),
    Range(RangeValidator),
    Size(SizeValidator),
    Selection(SelectionValidator),
    List(ListValidator),
}

impl Check {
    pub(crate) fn bind(&self, registry: &Weak<Registry>, owner: &str) {
        match self {
            Check::Type(check) => check.bind(registry, owner),
            Check::List(check) => check.element.bind(registry, owner),
            Check::Range(_) | Check::Size(_) | Check::Selection(_) => {}
        }
    }
}

impl Constraint for Check {
    fn check(&self, value: Value) -> SchemaResult<Value> {
        match self {
            Check::Type(check) => check.check(value),
            Check::Range(check) => check.check(value),
            Check::Size(check) => check.check(value),
            Check::Selection(check) => check.check(value),
            Check::List(check) => check.check(value),
        }
    }
}

impl From<TypeValidator> for Check {
    fn from(check: TypeValidator) -> Self {
        Check::Type(check)
    }
}

impl From<RangeValidator> for Check {
    fn from(check: RangeValidator) -> Self {
        Check::Range(check)
    }
}

impl From<SizeValidator> for Check {
    fn from(check: SizeValidator) -> Self {
        Check::Size(check)
    }
}

impl From<SelectionValidator> for Check {
    fn from(check: SelectionValidator) -> Self {
        Check::Selection(check)
    }
}

impl From<ListValidator> for Check {
    fn from(check: ListValidator) -> Self {
        Check::List(check)
    }
}

// =============================================================================
// Type
// =============================================================================

/// A declared type: a value kind, a record model, or an enum
#[derive(Debug, Clone)]
pub enum TypeRef {
    Kind(ValueKind),
    /// Record of the model or of any model composed from it.
    /// A model named by string is resolved through the registry on first use.
    Model(SchemaRef<Model>),
    /// Member of the named enum
    Enum(String),
}

impl TypeRef {
    /// Record of the model named `name`
    pub fn model(name: impl Into<String>) -> Self {
        TypeRef::Model(SchemaRef::named(name))
    }

    /// Record of `model`, no registry needed
    pub fn record_of(model: &Arc<Model>) -> Self {
        TypeRef::Model(SchemaRef::Direct(Arc::clone(model)))
    }

    pub fn type_name(&self) -> String {
        match self {
            TypeRef::Kind(kind) => kind.type_name().to_string(),
            TypeRef::Model(model) => format!("record {}", model.name()),
            TypeRef::Enum(name) => format!("enum {}", name),
        }
    }

    fn matches(&self, value: &Value) -> SchemaResult<bool> {
        match (self, value) {
            (TypeRef::Kind(kind), value) => Ok(kind.accepts(value.kind())),
            (TypeRef::Model(model), Value::Record(record)) => {
                let model = model.resolve()?;
                Ok(record.model().is_a(model.name()))
            }
            (TypeRef::Enum(name), Value::Enum(member)) => Ok(member.enum_name() == name),
            _ => Ok(false),
        }
    }

    /// Brings a matching value to the declared type's own form.
    ///
    /// Ints checked as floats become floats. Timestamps keep whole seconds,
    /// the resolution they have on the wire.
    fn normalize(&self, value: Value) -> Value {
        match (self, value) {
            (TypeRef::Kind(ValueKind::Float), Value::Int(n)) => Value::Float(n as f64),
            (TypeRef::Kind(ValueKind::Timestamp), Value::Timestamp(ts)) => {
                Value::Timestamp(ts.with_nanosecond(0).unwrap_or(ts))
            }
            (_, value) => value,
        }
    }
}

impl From<ValueKind> for TypeRef {
    fn from(kind: ValueKind) -> Self {
        TypeRef::Kind(kind)
    }
}

/// Value must match one of the declared types
#[derive(Debug, Clone)]
pub struct TypeValidator {
    types: Vec<TypeRef>,
}

impl TypeValidator {
    pub fn new(type_ref: impl Into<TypeRef>) -> Self {
        Self {
            types: vec![type_ref.into()],
        }
    }

    /// Accepts any of several types
    pub fn any_of(types: impl IntoIterator<Item = TypeRef>) -> SchemaResult<Self> {
        let types: Vec<TypeRef> = types.into_iter().collect();
        if types.is_empty() {
            return Err(SchemaError::InvalidDefinition(
                "type check needs at least one type".into(),
            ));
        }
        Ok(Self { types })
    }

    pub fn types(&self) -> &[TypeRef] {
        &self.types
    }

    fn expected(&self) -> String {
        self.types
            .iter()
            .map(TypeRef::type_name)
            .collect::<Vec<_>>()
            .join(" | ")
    }

    fn bind(&self, registry: &Weak<Registry>, owner: &str) {
        for type_ref in &self.types {
            if let TypeRef::Model(model) = type_ref {
                model.bind(registry, owner);
            }
        }
    }
}

impl Constraint for TypeValidator {
    fn check(&self, value: Value) -> SchemaResult<Value> {
        for type_ref in &self.types {
            if type_ref.matches(&value)? {
                return Ok(type_ref.normalize(value));
            }
        }
        Err(SchemaError::type_mismatch(
            self.expected(),
            value.type_description(),
        ))
    }
}

// =============================================================================
// Range
// =============================================================================

/// A numeric bound
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn of(value: &Value) -> Option<Number> {
        match value {
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Number::Int(i) => *i as f64,
            Number::Float(f) => *f,
        }
    }

    fn compare(&self, other: &Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl From<i64> for Number {
    fn from(i: i64) -> Self {
        Number::Int(i)
    }
}

impl From<i32> for Number {
    fn from(i: i32) -> Self {
        Number::Int(i64::from(i))
    }
}

impl From<f64> for Number {
    fn from(f: f64) -> Self {
        Number::Float(f)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(x) => write!(f, "{}", x),
        }
    }
}

/// Inclusive numeric bounds over int and float values
#[derive(Debug, Clone, PartialEq)]
pub struct RangeValidator {
    min: Option<Number>,
    max: Option<Number>,
}

impl RangeValidator {
    /// Creates a range check. `min > max` is rejected here, not at validation time.
    pub fn new(min: Option<Number>, max: Option<Number>) -> SchemaResult<Self> {
        for bound in [min, max].into_iter().flatten() {
            if let Number::Float(f) = bound {
                if f.is_nan() {
                    return Err(SchemaError::InvalidDefinition("range bound is NaN".into()));
                }
            }
        }
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo.compare(&hi) == Some(Ordering::Greater) {
                return Err(SchemaError::InvalidDefinition(format!(
                    "range min {} is greater than max {}",
                    lo, hi
                )));
            }
        }
        Ok(Self { min, max })
    }

    pub fn between(min: impl Into<Number>, max: impl Into<Number>) -> SchemaResult<Self> {
        Self::new(Some(min.into()), Some(max.into()))
    }

    pub fn at_least(min: impl Into<Number>) -> SchemaResult<Self> {
        Self::new(Some(min.into()), None)
    }

    pub fn at_most(max: impl Into<Number>) -> SchemaResult<Self> {
        Self::new(None, Some(max.into()))
    }

    pub fn min(&self) -> Option<Number> {
        self.min
    }

    pub fn max(&self) -> Option<Number> {
        self.max
    }
}

impl Constraint for RangeValidator {
    fn check(&self, value: Value) -> SchemaResult<Value> {
        let number = Number::of(&value)
            .ok_or_else(|| SchemaError::type_mismatch("number", value.type_description()))?;

        // NaN compares to nothing and so falls outside any bound
        let too_low = match self.min {
            Some(min) => !matches!(
                number.compare(&min),
                Some(Ordering::Greater) | Some(Ordering::Equal)
            ),
            None => false,
        };
        let too_high = match self.max {
            Some(max) => !matches!(
                number.compare(&max),
                Some(Ordering::Less) | Some(Ordering::Equal)
            ),
            None => false,
        };

        if too_low || too_high {
            return Err(SchemaError::OutOfRange {
                value: number.to_string(),
                bounds: describe_bounds(self.min, self.max),
            });
        }
        Ok(value)
    }
}

// =============================================================================
// Size
// =============================================================================

/// Inclusive length bounds over strings (in characters), lists and maps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeValidator {
    min_length: Option<usize>,
    max_length: Option<usize>,
}

impl SizeValidator {
    pub fn new(min_length: Option<usize>, max_length: Option<usize>) -> SchemaResult<Self> {
        if let (Some(lo), Some(hi)) = (min_length, max_length) {
            if lo > hi {
                return Err(SchemaError::InvalidDefinition(format!(
                    "min_length {} is greater than max_length {}",
                    lo, hi
                )));
            }
        }
        Ok(Self {
            min_length,
            max_length,
        })
    }

    pub fn between(min_length: usize, max_length: usize) -> SchemaResult<Self> {
        Self::new(Some(min_length), Some(max_length))
    }

    pub fn at_least(min_length: usize) -> Self {
        Self {
            min_length: Some(min_length),
            max_length: None,
        }
    }

    pub fn at_most(max_length: usize) -> Self {
        Self {
            min_length: None,
            max_length: Some(max_length),
        }
    }

    pub fn min_length(&self) -> Option<usize> {
        self.min_length
    }

    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }
}

impl Constraint for SizeValidator {
    fn check(&self, value: Value) -> SchemaResult<Value> {
        let length = match &value {
            Value::Str(s) => s.chars().count(),
            Value::List(items) => items.len(),
            Value::Map(map) => map.len(),
            other => {
                return Err(SchemaError::type_mismatch(
                    "sized value",
                    other.type_description(),
                ))
            }
        };

        let too_short = self.min_length.map_or(false, |min| length < min);
        let too_long = self.max_length.map_or(false, |max| length > max);

        if too_short || too_long {
            return Err(SchemaError::LengthOutOfRange {
                length,
                bounds: describe_bounds(self.min_length, self.max_length),
            });
        }
        Ok(value)
    }
}

// =============================================================================
// Selection
// =============================================================================

/// Value must be a member of a fixed set
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionValidator {
    allowed: Vec<Value>,
}

impl SelectionValidator {
    pub fn new<V: Into<Value>>(allowed: impl IntoIterator<Item = V>) -> SchemaResult<Self> {
        let allowed: Vec<Value> = allowed.into_iter().map(Into::into).collect();
        if allowed.is_empty() {
            return Err(SchemaError::InvalidDefinition(
                "selection needs at least one allowed value".into(),
            ));
        }
        Ok(Self { allowed })
    }

    pub fn allowed(&self) -> &[Value] {
        &self.allowed
    }

    fn describe_allowed(&self) -> String {
        let items: Vec<String> = self.allowed.iter().map(ToString::to_string).collect();
        format!("[{}]", items.join(", "))
    }
}

impl Constraint for SelectionValidator {
    fn check(&self, value: Value) -> SchemaResult<Value> {
        if self.allowed.iter().any(|allowed| same_choice(allowed, &value)) {
            return Ok(value);
        }
        Err(SchemaError::NotInSelection {
            value: value.to_string(),
            allowed: self.describe_allowed(),
        })
    }
}

/// Equality, with ints and floats compared by numeric value
fn same_choice(allowed: &Value, value: &Value) -> bool {
    match (allowed, value) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
        _ => allowed == value,
    }
}

// =============================================================================
// List
// =============================================================================

/// Value must be a list whose every element passes the element validator
#[derive(Debug, Clone)]
pub struct ListValidator {
    element: Box<Validator>,
}

impl ListValidator {
    pub fn new(element: Validator) -> Self {
        Self {
            element: Box::new(element),
        }
    }

    pub fn element(&self) -> &Validator {
        &self.element
    }
}

impl Constraint for ListValidator {
    fn check(&self, value: Value) -> SchemaResult<Value> {
        let items = match value {
            Value::List(items) => items,
            other => return Err(SchemaError::type_mismatch("list", other.type_description())),
        };

        let mut validated = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let item = self
                .element
                .validate(Some(item))
                .map_err(|e| e.at_index(index))?;
            validated.push(item.unwrap_or(Value::Null));
        }
        Ok(Value::List(validated))
    }
}
