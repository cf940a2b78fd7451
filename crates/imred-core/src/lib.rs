pub mod consts;
pub mod error;
pub mod frame;
pub mod header;
pub mod stats;
pub mod io;
pub mod stack;
pub mod calib;
pub mod reduce;
pub mod post;
pub mod wcs;
pub mod pipeline;
