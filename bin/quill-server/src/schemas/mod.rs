//! Request / response DTO types for the JSON API.
//!
//! Annotated with [`utoipa`] attributes so the OpenAPI document is generated
//! from the same types the handlers (de)serialise.

pub mod v1;
