pub use image_gen_core::{artifact, contract, messaging, signature, storage_keys};
