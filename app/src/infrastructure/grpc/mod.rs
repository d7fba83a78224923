//! Generated-style bindings for the Scanner frontend protocol
//! (`strelka.proto`, empty protobuf package).

pub mod strelka;
