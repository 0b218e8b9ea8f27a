pub mod messaging;
pub mod model_service;
pub mod object_store;
