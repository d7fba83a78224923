mod object_store;
mod reputation;
mod scanner;
mod unpacker;

#[rustfmt::skip]
pub use {
    object_store::ObjectStoreServiceImpl,
    reputation::{ReputationServiceImpl, TokioSleeper},
    scanner::ScannerServiceImpl,
    unpacker::ArchiveUnpackServiceImpl,
};
