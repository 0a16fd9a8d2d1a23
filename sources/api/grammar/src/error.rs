use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    // Deliberately says nothing about which token failed.
    #[snafu(display("unknown or invalid command path/value"))]
    UnknownCommand,

    #[snafu(display("Unable to parse command catalog: {}", source))]
    CatalogParse { source: serde_json::Error },

    #[snafu(display("Invalid command catalog entry #{}: {}", index, msg))]
    InvalidEntry { index: usize, msg: String },
}

pub type Result<T> = std::result::Result<T, Error>;
