//! Field validation
//!
//! A [`Validator`] applies required/default semantics and then runs its
//! ordered checks. Checks are independent and composable: a field's
//! validator is just the list of constraints declared for it.

mod checks;
mod validator;

pub use checks::{
    Check, Constraint, ListValidator, Number, RangeValidator, SelectionValidator, SizeValidator,
    TypeRef, TypeValidator,
};
pub use validator::{ExtraCheck, Validator};
