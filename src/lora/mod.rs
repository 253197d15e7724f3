pub mod traits;

pub use traits::{LoraError, LoraRadio, RxPacket};
