pub(crate) mod copy_back;
pub mod cpu;
