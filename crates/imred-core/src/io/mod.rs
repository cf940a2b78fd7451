pub mod catalog;
pub mod fits;
pub mod fits_writer;
pub mod preview;
pub mod products;
