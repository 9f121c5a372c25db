mod facade;
mod mediasoup;

pub use facade::{NewConsumer, Sfu, SfuError};
pub use self::mediasoup::MediasoupSfu;
