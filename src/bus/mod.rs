pub mod delay;
pub mod register;

#[cfg(test)]
pub mod mock;

pub use delay::ThreadDelay;
pub use register::RegisterDevice;
