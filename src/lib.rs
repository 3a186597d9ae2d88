pub mod cli;
pub mod codec;
pub mod error;
pub mod options;
pub mod protocol;
pub mod query;
pub mod result;
pub mod session;
pub mod transfer;
pub mod value;

pub use codec::{Codec, Compression, Encoded, Format, Reentrant, SingleOwner};
pub use error::{ConfigurationError, DecodeError, EncodeError, ResultError, TransferError};
pub use options::{FilterOperation, QueryOptions, SortOrder};
pub use query::{Query, QueryType};
pub use result::{ResultBody, ResultSet, ResultType};
pub use session::SessionOptions;
pub use transfer::{
    Dispatcher, Inbound, MessageSink, TransferConfig, TransferObserver, TransferStats,
};
pub use value::{NativeValue, Value, ValueMap};

/// Short keys used on the wire by both formats.
pub mod keys {
    pub mod query {
        pub const ID: &str = "q";
        pub const TYPE: &str = "t";
        pub const PARAMETERS: &str = "p";
        pub const PAYLOAD: &str = "l";
    }

    pub mod result {
        pub const TYPE: &str = "rt";
        pub const RESULTS: &str = "r";
        pub const COLUMNS: &str = "col";
        pub const FIRST: &str = "s_s";
        pub const MAX: &str = "s_n";
        pub const TOTAL: &str = "tot";
    }

    pub mod options {
        pub const FIRST: &str = super::result::FIRST;
        pub const MAX: &str = super::result::MAX;
        pub const SORT_FIELD: &str = "sf";
        pub const SORT_ORDER: &str = "so";
        pub const FILTER_FIELD: &str = "ff";
        pub const FILTER_VALUE: &str = "fv";
        pub const FILTER_OPERATION: &str = "fo";
    }

    pub mod session {
        pub const FORMAT: &str = "format";
        pub const COMPRESSION: &str = "compression";
        pub const STREAMING: &str = "streaming";
        pub const BATCHING: &str = "batching";
        pub const BATCH_SIZE: &str = "batch_size";
    }
}
