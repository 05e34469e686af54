// Adapters layer: concrete implementations for external systems (files, spreadsheet codecs).

pub mod storage;
pub mod tabular;
