pub mod prelude;

pub mod videos;
