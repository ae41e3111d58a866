//! Núcleo do kernel: handoff do bootloader, logging e inicialização.

pub mod entry;
pub mod handoff;
pub mod logging;

pub use handoff::BootInfo;
