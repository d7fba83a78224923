mod object_store;
mod reputation;
mod scanner;
mod submit;
mod unpacker;

#[rustfmt::skip]
pub use {
    object_store::ObjectStoreService,
    reputation::ReputationService,
    scanner::ScannerService,
    submit::SubmitService,
    unpacker::ArchiveUnpackService,
};
