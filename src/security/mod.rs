//! Security primitives.

mod registration_key;

pub use registration_key::RegistrationKeyCodec;
