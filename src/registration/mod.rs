// src/registration/mod.rs — Registration domain types and pure validators

pub mod code;
pub mod validate;

pub use code::{CodeError, CodePrefix, RegistrationCode};
pub use validate::{
    normalize_payment_day, validate_address, validate_person_name, Validation, LAST_DAY_OF_MONTH,
};
