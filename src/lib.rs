//! Ember Kernel Library.
//!
//! Ponto central de exportação dos módulos do kernel.
//! Define a estrutura hierárquica do sistema operacional.
//!
//! Em builds de teste (host) a biblioteca é compilada com `std` para que
//! as suítes `#[test]` rodem com o harness normal; no kernel real é
//! estritamente `no_std`.

#![cfg_attr(not(test), no_std)]
#![allow(clippy::missing_safety_doc)]

// Habilitar alocação dinâmica (Vec/Box/Arc sobre o heap do kernel)
extern crate alloc;

// --- Módulos de Baixo Nível (Hardware) ---
pub mod arch; // HAL (CPU, GDT, IDT, entrada de syscall)
pub mod drivers; // Drivers (Serial, ATA, Teclado, Timer, Vídeo)

// --- Módulos Centrais (Lógica do Kernel) ---
pub mod core; // Inicialização, Handoff, Logging
pub mod klib; // Utilitários internos (align, framework de teste)
pub mod mm; // Gerenciamento de memória (PMM, Heap, Paging, vmem)
pub mod sync; // Primitivas de sincronização (Spinlock IRQ-safe)

// --- Subsistemas ---
pub mod fs; // Block cache, FAT16, VFS
pub mod sched; // Scheduler, tasks, loader ELF
pub mod shell; // Shell de linha de comando (periférico)
pub mod syscall; // Interface com userspace

#[cfg(not(test))]
mod panic;

// Re-exportar BootInfo para acesso fácil no binário
pub use crate::core::handoff::BootInfo;
