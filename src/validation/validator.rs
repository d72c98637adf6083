//! Composable field validator
//!
//! A [`Validator`] owns the required/default semantics of one value and an
//! ordered list of [`Check`]s. The pipeline is:
//!
//! 1. absent (or null) with a default: substitute the default
//! 2. still absent, not required: return absent
//! 3. still absent, required: `MissingRequiredValue`
//! 4. run every check in order, then the extra check
//!
//! The first failing step aborts.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::errors::{SchemaError, SchemaResult};
use crate::registry::Registry;
use crate::value::{Value, ValueKind};

use super::checks::{
    Check, Constraint, ListValidator, RangeValidator, SelectionValidator, SizeValidator,
    TypeRef, TypeValidator,
};

/// Caller-supplied predicate run after the built-in checks.
///
/// Returning `Err(message)` fails validation with `ExtraCheckFailed(message)`.
pub type ExtraCheck = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

#[derive(Clone)]
pub struct Validator {
    required: bool,
    default: Option<Value>,
    checks: Vec<Check>,
    extra_check: Option<ExtraCheck>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// A required validator with no checks
    pub fn new() -> Self {
        Self {
            required: true,
            default: None,
            checks: Vec::new(),
            extra_check: None,
        }
    }

    /// Validator whose single check is a type check
    pub fn typed(type_ref: impl Into<TypeRef>) -> Self {
        Self::new().with_check(TypeValidator::new(type_ref))
    }

    pub fn boolean() -> Self {
        Self::typed(ValueKind::Bool)
    }

    pub fn integer() -> Self {
        Self::typed(ValueKind::Int)
    }

    pub fn float() -> Self {
        Self::typed(ValueKind::Float)
    }

    pub fn string() -> Self {
        Self::typed(ValueKind::Str)
    }

    pub fn timestamp() -> Self {
        Self::typed(ValueKind::Timestamp)
    }

    /// List validator applying `element` to every item
    pub fn list(element: Validator) -> Self {
        Self::new().with_check(ListValidator::new(element))
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        let default = default.into();
        self.default = if default.is_null() { None } else { Some(default) };
        self
    }

    pub fn with_check(mut self, check: impl Into<Check>) -> Self {
        self.checks.push(check.into());
        self
    }

    pub fn with_range(self, range: RangeValidator) -> Self {
        self.with_check(range)
    }

    pub fn with_size(self, size: SizeValidator) -> Self {
        self.with_check(size)
    }

    pub fn with_selection(self, selection: SelectionValidator) -> Self {
        self.with_check(selection)
    }

    pub fn with_extra_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.extra_check = Some(Arc::new(check));
        self
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn has_extra_check(&self) -> bool {
        self.extra_check.is_some()
    }

    /// Validates a possibly absent value.
    ///
    /// `Ok(None)` means the value is absent and allowed to be.
    pub fn validate(&self, value: Option<Value>) -> SchemaResult<Option<Value>> {
        let value = match Value::present(value).or_else(|| self.default.clone()) {
            Some(value) => value,
            None if self.required => return Err(SchemaError::MissingRequiredValue),
            None => return Ok(None),
        };

        let mut value = value;
        for check in &self.checks {
            value = check.check(value)?;
        }

        if let Some(extra) = &self.extra_check {
            extra(&value).map_err(SchemaError::ExtraCheckFailed)?;
        }

        Ok(Some(value))
    }

    /// Validates a value that must be present
    pub fn validate_present(&self, value: Value) -> SchemaResult<Value> {
        self.validate(Some(value))?
            .ok_or(SchemaError::MissingRequiredValue)
    }

    pub(crate) fn bind(&self, registry: &Weak<Registry>, owner: &str) {
        for check in &self.checks {
            check.bind(registry, owner);
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("required", &self.required)
            .field("default", &self.default)
            .field("checks", &self.checks)
            .field("extra_check", &self.extra_check.is_some())
            .finish()
    }
}
