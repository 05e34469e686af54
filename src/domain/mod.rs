// Domain layer: identifier types and ports (interfaces). No I/O here.

pub mod model;
pub mod ports;
