pub mod directory;
pub mod package;
pub mod sequence;
pub mod sort;
