pub(crate) mod request_logging;
