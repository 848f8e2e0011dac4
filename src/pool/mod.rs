//! Reusable object pooling.
//!
//! # Components
//! - [`ObjectPool`] - generic rent/give-back pool over a lock-free free list
//! - [`ByteBufferPool`] - pool of fixed-capacity [`ByteBuffer`]s
//! - [`RentedBuffer`] - RAII handle that returns its buffer on drop

mod byte_buffer;
mod object_pool;
mod rented;

pub use byte_buffer::{ByteBuffer, ByteBufferPool};
pub use object_pool::{ObjectPool, PoolId, PoolItem, PoolSlot};
pub use rented::RentedBuffer;
