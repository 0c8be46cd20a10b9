pub mod mux;
pub mod seek;
