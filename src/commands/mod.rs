pub mod check_json;
pub mod inspect;
pub mod validate;
