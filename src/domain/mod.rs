//! Domain layer: aggregates, value objects, events and pure domain services.
pub mod aggregates;
pub mod events;
pub mod services;
pub mod value_objects;
