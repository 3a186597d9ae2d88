//! Session options negotiated with a CONFIGURATION query.
use log::debug;

use crate::{
    codec::{Compression, Concurrency, Format},
    error::ConfigurationError,
    keys::session as key,
    query::{Query, QueryType},
    transfer::{Dispatcher, MessageSink},
    value::{Value, ValueMap},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub format: Format,
    pub compression: Compression,
    pub streaming: bool,
    pub batching: bool,
    pub batch_size: i32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            format: Format::Json,
            compression: Compression::None,
            streaming: false,
            batching: false,
            batch_size: 0,
        }
    }
}

impl SessionOptions {
    /// Reads options from a CONFIGURATION query's parameters. Missing keys keep their defaults.
    pub fn from_parameters(parameters: &ValueMap) -> Result<Self, ConfigurationError> {
        Self::default().with_parameters(parameters)
    }

    /// Options matching the dispatcher's current format and compression.
    pub fn from_dispatcher<S, M>(dispatcher: &Dispatcher<S, M>) -> Self
    where
        S: MessageSink,
        M: Concurrency,
    {
        Self {
            format: dispatcher.format(),
            compression: dispatcher.compression(),
            ..Self::default()
        }
    }

    /// Overrides the options present in `parameters`; missing keys keep the values of `self`.
    pub fn with_parameters(mut self, parameters: &ValueMap) -> Result<Self, ConfigurationError> {
        if let Some(format) = string_option(parameters, key::FORMAT)? {
            self.format = format.parse()?;
        }
        if let Some(compression) = string_option(parameters, key::COMPRESSION)? {
            self.compression = compression.parse()?;
        }
        if let Some(streaming) = bool_option(parameters, key::STREAMING)? {
            self.streaming = streaming;
        }
        if let Some(batching) = bool_option(parameters, key::BATCHING)? {
            self.batching = batching;
        }
        if let Some(value) = parameters.get(key::BATCH_SIZE) {
            self.batch_size = value
                .as_i32()
                .filter(|size| *size >= 0)
                .ok_or_else(|| ConfigurationError::InvalidOption {
                    option: key::BATCH_SIZE,
                    reason: format!("expected a non-negative integer, found {}", value.kind()),
                })?;
        }

        Ok(self)
    }

    pub fn to_parameters(&self) -> ValueMap {
        let mut parameters = ValueMap::new();
        parameters.insert(key::FORMAT.into(), self.format.name().into());
        parameters.insert(key::COMPRESSION.into(), self.compression.name().into());
        parameters.insert(key::STREAMING.into(), self.streaming.into());
        parameters.insert(key::BATCHING.into(), self.batching.into());
        parameters.insert(key::BATCH_SIZE.into(), self.batch_size.into());
        parameters
    }

    /// Switches the dispatcher to the negotiated format. The dispatcher is untouched on error.
    pub fn apply<S, M>(&self, dispatcher: &mut Dispatcher<S, M>) -> Result<(), ConfigurationError>
    where
        S: MessageSink,
        M: Concurrency,
    {
        debug!("applying session options {self:?}");
        dispatcher.configure(self.format, self.compression)
    }
}

impl Query {
    pub fn configuration(id: i32, options: &SessionOptions) -> Self {
        Query::new(id, QueryType::Configuration).with_parameters(options.to_parameters())
    }
}

fn string_option<'a>(
    parameters: &'a ValueMap,
    option: &'static str,
) -> Result<Option<&'a str>, ConfigurationError> {
    match parameters.get(option) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| ConfigurationError::InvalidOption {
                option,
                reason: format!("expected string, found {}", value.kind()),
            }),
    }
}

fn bool_option(
    parameters: &ValueMap,
    option: &'static str,
) -> Result<Option<bool>, ConfigurationError> {
    match parameters.get(option) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_bool()
            .map(Some)
            .ok_or_else(|| ConfigurationError::InvalidOption {
                option,
                reason: format!("expected bool, found {}", value.kind()),
            }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::protocol::FrameSink;

    use super::*;

    #[test]
    fn missing_keys_keep_defaults() {
        let options = SessionOptions::from_parameters(&ValueMap::new()).unwrap();
        assert_eq!(options, SessionOptions::default());
        assert_eq!(options.format, Format::Json);
        assert_eq!(options.compression, Compression::None);
    }

    #[test]
    fn parameters_round_trip() {
        let options = SessionOptions {
            format: Format::Bson,
            compression: Compression::Best,
            streaming: true,
            batching: true,
            batch_size: 250,
        };
        let query = Query::configuration(4, &options);

        assert_eq!(query.kind, QueryType::Configuration);
        assert_eq!(query.parameter("format"), Some(&Value::Str("bson".into())));
        assert_eq!(
            SessionOptions::from_parameters(&query.parameters).unwrap(),
            options
        );
    }

    #[test]
    fn unknown_format_is_rejected() {
        let parameters: ValueMap = [("format".to_string(), Value::from("xml"))].into();
        assert_eq!(
            SessionOptions::from_parameters(&parameters),
            Err(ConfigurationError::UnknownFormat("xml".into()))
        );
    }

    #[test]
    fn missing_format_keeps_the_dispatcher_format() {
        let sink = Arc::new(FrameSink::new(Vec::new()));
        let mut dispatcher: Dispatcher<FrameSink<Vec<u8>>> = Dispatcher::new(sink);
        dispatcher.set_format("bson", "none").unwrap();
        let parameters: ValueMap = [("compression".to_string(), Value::from("fastest"))].into();

        let options = SessionOptions::from_dispatcher(&dispatcher)
            .with_parameters(&parameters)
            .unwrap();
        options.apply(&mut dispatcher).unwrap();

        assert_eq!(dispatcher.format(), Format::Bson);
        assert_eq!(dispatcher.compression(), Compression::Fastest);
    }

    #[test]
    fn mistyped_options_are_rejected() {
        let parameters: ValueMap = [("streaming".to_string(), Value::from("yes"))].into();
        assert!(matches!(
            SessionOptions::from_parameters(&parameters),
            Err(ConfigurationError::InvalidOption {
                option: "streaming",
                ..
            })
        ));

        let parameters: ValueMap = [("batch_size".to_string(), Value::Int32(-1))].into();
        assert!(SessionOptions::from_parameters(&parameters).is_err());
    }
}
