//! Record formats: the text record format persisted between jobs, and the binary run format
//! used for intermediate map output.
pub mod lines;
pub mod util;
pub mod writelog;
