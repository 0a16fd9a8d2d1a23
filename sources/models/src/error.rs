use snafu::Snafu;

/// Possible errors from building keys and converting configuration values.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Key name '{}' has invalid format: {}", name, msg))]
    InvalidKey { name: String, msg: String },

    #[snafu(display("Key name beyond maximum length {}: {}", max, name))]
    KeyTooLong { name: String, max: usize },

    #[snafu(display("Configuration values can't be null (at '{}')", location))]
    NullValue { location: String },
}

pub type Result<T> = std::result::Result<T, Error>;
