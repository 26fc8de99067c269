#[cfg(feature = "blocking")]
mod blocking;
mod client;
mod errors;
